//! Buffer addition: a tile stitched with the borders of its neighbours.
use std::path::Path;

use tracing::{debug, info, warn};

use crate::api::las_clip::crop_cloud;
use crate::api::las_info::writer_params_from_header;
use crate::api::las_merge::{create_list, merge_clouds};
use crate::core::tiles::buffered_bounds_from_filename;
use crate::error::{Error, Result};
use crate::io::las::read_point_cloud;
use crate::types::Bounds;

#[derive(Debug, Clone)]
pub struct BufferParams {
    pub buffer_width: f64,
    /// CRS written in the output
    pub spatial_ref: String,
    pub tile_width: f64,
    /// Scale of the coordinates in tile filenames (1000 for kilometres)
    pub tile_coord_scale: f64,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            buffer_width: 100.0,
            spatial_ref: "EPSG:2154".to_string(),
            tile_width: 1000.0,
            tile_coord_scale: 1000.0,
        }
    }
}

/// Merge `tile_filename` with its neighbours from `input_dir`, cropped to the
/// tile extent grown by the buffer width
pub fn create_las_with_buffer<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
    input_dir: P,
    tile_filename: Q,
    output_filename: R,
    params: &BufferParams,
) -> Result<()> {
    let bounds = buffered_bounds_from_filename(
        tile_filename.as_ref(),
        params.buffer_width,
        params.tile_width,
        params.tile_coord_scale,
    )?;
    debug!("Add buffer of size {} to tile.", params.buffer_width);
    las_merge_and_crop(input_dir, tile_filename, &bounds, output_filename, params)
}

/// Crop the tile and each of its neighbours to `bounds` one file at a time,
/// then merge the crops
pub fn las_merge_and_crop<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
    input_dir: P,
    tile_filename: Q,
    bounds: &Bounds,
    output_filename: R,
    params: &BufferParams,
) -> Result<()> {
    let files = create_list(
        input_dir,
        tile_filename,
        params.tile_width,
        params.tile_coord_scale,
    )?;
    let mut crops = Vec::with_capacity(files.len());
    for file in &files {
        let crop = crop_cloud(read_point_cloud(file)?, bounds);
        if crop.is_empty() {
            warn!(
                "File {} ignored in merge/crop: No points in crop bounding box",
                file.display()
            );
        } else {
            crops.push(crop);
        }
    }
    if crops.is_empty() {
        return Err(Error::EmptyTileList);
    }
    let merged = merge_clouds(crops)?;
    let writer_params = writer_params_from_header(&merged.header, Some(&params.spatial_ref))?;
    merged.write(&output_filename, &writer_params)?;
    info!(
        "Wrote {} ({} points, bounds {})",
        output_filename.as_ref().display(),
        merged.len(),
        bounds
    );
    Ok(())
}
