//! Random LAS/LAZ files, used to build test inputs.
use std::path::Path;

use las::point::{Classification, Format};
use las::{Builder, Color, Point};
use serde::Serialize;
use tracing::info;

use crate::core::params::{ExtraDims, Offset, WriterParams};
use crate::error::Result;
use crate::io::extra_bytes::ExtraBytesLayout;
use crate::io::las::{PointCloud, list_dims};
use crate::types::DimensionType;

#[derive(Debug, Clone)]
pub struct RandomLazParams {
    pub point_format: u8,
    pub num_points: usize,
    /// EPSG code written in the file
    pub crs: u16,
    /// Center of the area the points are drawn in
    pub center: (f64, f64),
    /// Points are drawn in `center ± half_width` on both axes
    pub half_width: f64,
    /// `(name, type)` pairs, e.g. `("height", "float64")`
    pub extra_dims: Vec<(String, String)>,
    /// Fixed seed for reproducible clouds
    pub seed: Option<u64>,
}

impl Default for RandomLazParams {
    fn default() -> Self {
        Self {
            point_format: 3,
            num_points: 100,
            crs: 2154,
            center: (650_000.0, 6_810_000.0),
            half_width: 1000.0,
            extra_dims: Vec::new(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RandomLazReport {
    pub output_file: String,
    pub num_points: usize,
    pub dimensions: Vec<String>,
}

fn random_extra_value(rng: &mut fastrand::Rng, data_type: DimensionType) -> f64 {
    if data_type.is_float() {
        rng.f64() * 10.0
    } else if data_type.is_signed() {
        rng.i32(-100..100) as f64
    } else {
        rng.u32(0..100) as f64
    }
}

fn random_classification(rng: &mut fastrand::Rng, max: u8) -> Result<Classification> {
    // 12 is the legacy overlap code, which has no classification value
    let mut class = rng.u8(0..max);
    while class == 12 {
        class = rng.u8(0..max);
    }
    Ok(Classification::new(class)?)
}

/// Write a LAS 1.4 file of random points with the given CRS and extra dimensions
pub fn create_random_laz<P: AsRef<Path>>(
    output_file: P,
    params: &RandomLazParams,
) -> Result<RandomLazReport> {
    let output_file = output_file.as_ref();
    let mut layout = ExtraBytesLayout::default();
    let mut extra_types = Vec::with_capacity(params.extra_dims.len());
    for (name, type_name) in &params.extra_dims {
        let data_type: DimensionType = type_name.parse()?;
        layout.push(name, data_type)?;
        extra_types.push(data_type);
    }

    let format = Format::new(params.point_format)?;
    let mut builder = Builder::from((1, 4));
    builder.point_format = format;
    builder.point_format.extra_bytes = layout.record_length();
    builder.vlrs.extend(layout.to_vlr());
    let header = builder.into_header()?;

    let mut rng = match params.seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };
    // 66 is the highest class of the LidarHD product
    let num_classes = if params.point_format > 3 { 66 } else { 10 };
    let (cx, cy) = params.center;
    let w = params.half_width;

    let mut points = Vec::with_capacity(params.num_points);
    for _ in 0..params.num_points {
        let mut point = Point {
            x: cx - w + rng.f64() * 2.0 * w,
            y: cy - w + rng.f64() * 2.0 * w,
            z: rng.f64() * 200.0,
            intensity: rng.u16(0..255),
            classification: random_classification(&mut rng, num_classes)?,
            return_number: 1,
            number_of_returns: 1,
            gps_time: format.has_gps_time.then(|| rng.f64() * 1e6),
            color: format
                .has_color
                .then(|| Color::new(rng.u16(..), rng.u16(..), rng.u16(..))),
            nir: format.has_nir.then(|| rng.u16(..)),
            extra_bytes: vec![0; layout.record_length() as usize],
            ..Default::default()
        };
        for (index, data_type) in extra_types.iter().enumerate() {
            layout.set(&mut point, index, random_extra_value(&mut rng, *data_type));
        }
        points.push(point);
    }

    let cloud = PointCloud {
        header,
        layout,
        points,
    };
    let writer_params = WriterParams {
        dataformat_id: params.point_format,
        extra_dims: ExtraDims::all(),
        offset_x: Offset::Value(0.0),
        offset_y: Offset::Value(0.0),
        offset_z: Offset::Value(0.0),
        a_srs: Some(format!("EPSG:{}", params.crs)),
        ..Default::default()
    };
    cloud.write(output_file, &writer_params)?;
    info!(
        "Created random point cloud {} ({} points)",
        output_file.display(),
        params.num_points
    );

    Ok(RandomLazReport {
        output_file: output_file.display().to_string(),
        num_points: params.num_points,
        dimensions: list_dims(&cloud),
    })
}
