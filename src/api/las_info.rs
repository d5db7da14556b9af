//! Header-level information about LAS/LAZ files: extent, CRS, tile origin and
//! the writer parameters that reproduce a file's layout.
use std::path::Path;

use las::Header;
use serde::Serialize;

use crate::core::params::WriterParams;
use crate::core::tiles::{infer_tile_origin, tile_bbox};
use crate::error::{Error, Result};
use crate::io::dimension::Dimension;
use crate::io::extra_bytes::ExtraBytesLayout;
use crate::io::las::{epsg_of, read_header};
use crate::types::Bounds;

/// Summary of a LAS header, serialized by the `info` command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LasInfo {
    pub point_count: u64,
    pub version: String,
    pub dataformat_id: u8,
    pub compressed: bool,
    pub global_encoding: u16,
    pub epsg: Option<u16>,
    pub bounds: Bounds,
    pub minz: f64,
    pub maxz: f64,
    pub scale: [f64; 3],
    pub offset: [f64; 3],
    pub dims: Vec<String>,
}

pub fn las_info<P: AsRef<Path>>(path: P) -> Result<LasInfo> {
    let header = read_header(path)?;
    let raw = header.clone().into_raw()?;
    let t = header.transforms();
    let layout = ExtraBytesLayout::from_header(&header)?;
    let mut dims: Vec<String> = Dimension::standard_for_format(header.point_format())
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    dims.extend(layout.names());
    Ok(LasInfo {
        point_count: header.number_of_points(),
        version: header.version().to_string(),
        dataformat_id: header.point_format().to_u8()?,
        compressed: header.point_format().is_compressed,
        global_encoding: raw.global_encoding,
        epsg: epsg_of(&header),
        bounds: bounds_from_header(&header),
        minz: header.bounds().min.z,
        maxz: header.bounds().max.z,
        scale: [t.x.scale, t.y.scale, t.z.scale],
        offset: [t.x.offset, t.y.offset, t.z.offset],
        dims,
    })
}

/// XY extent recorded in a header
pub fn bounds_from_header(header: &Header) -> Bounds {
    let b = header.bounds();
    Bounds::new(b.min.x, b.max.x, b.min.y, b.max.y)
}

/// Header extent of a file grown by `buffer_width` on every side
pub fn xy_bounds<P: AsRef<Path>>(path: P, buffer_width: f64) -> Result<Bounds> {
    Ok(bounds_from_header(&read_header(path)?).buffered(buffer_width))
}

/// Theoretical upper left corner of the tile a file belongs to, from its header extent
pub fn tile_origin_from_header<P: AsRef<Path>>(path: P, tile_width: f64) -> Result<(f64, f64)> {
    let b = bounds_from_header(&read_header(path)?);
    infer_tile_origin(b.minx, b.maxx, b.miny, b.maxy, tile_width)
}

/// Theoretical extent of the tile a file belongs to
pub fn tile_bbox_from_header<P: AsRef<Path>>(path: P, tile_width: f64) -> Result<Bounds> {
    Ok(tile_bbox(tile_origin_from_header(path, tile_width)?, tile_width))
}

pub fn epsg_from_header(header: &Header) -> Result<u16> {
    epsg_of(header).ok_or_else(|| {
        Error::MissingEpsg("no EPSG authority found in the CRS records of the header".into())
    })
}

/// CRS of a file as `EPSG:XXXX`, `None` when it has no usable CRS record
pub fn epsg_from_las<P: AsRef<Path>>(path: P) -> Result<Option<String>> {
    Ok(epsg_of(&read_header(path)?).map(|code| format!("EPSG:{}", code)))
}

/// Writer parameters copied from an input header; `a_srs` overrides its CRS
pub fn writer_params_from_header(header: &Header, a_srs: Option<&str>) -> Result<WriterParams> {
    let mut params = WriterParams::from_header(header)?;
    if let Some(srs) = a_srs {
        params.a_srs = Some(srs.to_string());
    }
    Ok(params)
}
