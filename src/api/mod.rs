//! High-level library API: one module per tool, each working from file paths
//! to file paths. Prefer these entrypoints over the low-level `io` and `core`
//! modules when integrating the tools.
pub mod add_points_in_las;
pub mod add_points_in_pointcloud;
pub mod color;
pub mod compare;
pub mod count_occurences;
pub mod create_random_laz;
pub mod download_image;
pub mod las_add_buffer;
pub mod las_clip;
pub mod las_info;
pub mod las_merge;
pub mod merge_counts;
pub mod remove_dimensions;
pub mod rename_dimension;
pub mod replace_area;
pub mod replace_attribute;
pub mod standardize_format;
pub mod transform_geo;

pub use add_points_in_las::{add_points_in_las, extract_points_from_geo, parse_dimension_values};
pub use add_points_in_pointcloud::{
    VIRTUAL_POINTS_CLASS, VirtualPointsParams, add_points_from_geometry_to_las, add_points_to_las,
    clip_3d_lines_to_tile, clip_3d_points_to_tile, generate_3d_points_from_lines,
};
pub use color::{ColorImages, ColorParams, color, color_from_source};
pub use compare::{
    DimensionComparison, compare_las_classification, compare_las_dimensions, parse_precision,
};
pub use count_occurences::{Counts, compute_count, compute_count_one_file};
pub use create_random_laz::{RandomLazParams, RandomLazReport, create_random_laz};
pub use download_image::{DownloadParams, download_image, download_image_from_source};
pub use las_add_buffer::{BufferParams, create_las_with_buffer, las_merge_and_crop};
pub use las_clip::las_crop;
pub use las_info::{
    LasInfo, epsg_from_header, epsg_from_las, las_info, tile_bbox_from_header,
    tile_origin_from_header, writer_params_from_header, xy_bounds,
};
pub use las_merge::{create_list, las_merge};
pub use merge_counts::merge_counts;
pub use remove_dimensions::remove_dimensions;
pub use rename_dimension::rename_dimension;
pub use replace_area::{ReplaceCounts, replace_area};
pub use replace_attribute::{
    ReplacementMap, parse_replacement_map, read_replacement_map, replace_values,
};
pub use standardize_format::{params_from_file, standardize};
pub use transform_geo::transform_geo;
