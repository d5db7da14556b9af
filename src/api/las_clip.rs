//! 2D cropping of point clouds.
use std::path::Path;

use tracing::info;

use crate::api::las_info::writer_params_from_header;
use crate::error::Result;
use crate::io::las::{PointCloud, read_point_cloud};
use crate::types::Bounds;

/// Points of `cloud` inside `bounds`, edges included
pub fn crop_cloud(mut cloud: PointCloud, bounds: &Bounds) -> PointCloud {
    cloud.points.retain(|p| bounds.contains_xy(p.x, p.y));
    cloud
}

/// Crop a file to a 2D box and write it with the CRS `spatial_ref`.
/// Returns the number of points written.
pub fn las_crop<P: AsRef<Path>, Q: AsRef<Path>>(
    input_file: P,
    output_file: Q,
    bounds: &Bounds,
    spatial_ref: &str,
) -> Result<usize> {
    let cloud = read_point_cloud(&input_file)?;
    let params = writer_params_from_header(&cloud.header, Some(spatial_ref))?;
    let total = cloud.len();
    let cropped = crop_cloud(cloud, bounds);
    info!(
        "Crop {} to {}: {} of {} points kept",
        input_file.as_ref().display(),
        bounds,
        cropped.len(),
        total
    );
    cropped.write(output_file, &params)?;
    Ok(cropped.len())
}
