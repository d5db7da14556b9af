#![doc = r#"
lidar-tools — utilities for airborne LIDAR point-cloud tiles (LAS/LAZ).

This crate provides a typed API over the operations usually chained when
preparing tiles: merging a tile with the border of its neighbours, cropping,
colorizing from orthoimagery, adding virtual points from vector geometries,
replacing areas of one cloud by another, and rewriting files with standard
writer parameters. It powers the `lidar-tools` CLI and can be embedded in your
own Rust applications.

Requirements
------------
- GDAL development headers and runtime available on your system.
- Rust 2024 edition toolchain.

Add a buffer around a tile
--------------------------
Tiles are named `prefix1_prefix2_coordx_coordy_suffix`, with coordinates of the
top left corner in kilometres by default.

```rust,no_run
use lidar_tools::{BufferParams, create_las_with_buffer};

fn main() -> lidar_tools::Result<()> {
    create_las_with_buffer(
        "/data/tiles",
        "/data/tiles/Semis_2021_0770_6278_LA93_IGN69.laz",
        "/out/Semis_2021_0770_6278_LA93_IGN69.laz",
        &BufferParams {
            buffer_width: 100.0,
            ..Default::default()
        },
    )
}
```

Standardize a file
------------------
```rust,no_run
use lidar_tools::{WriterParams, standardize};

fn main() -> lidar_tools::Result<()> {
    let params = WriterParams {
        dataformat_id: 8,
        a_srs: Some("EPSG:2154".to_string()),
        ..Default::default()
    };
    // drop points of class 65 and 66
    let written = standardize("/data/in.laz", "/out/std.laz", &params, &[65, 66])?;
    println!("{written} points");
    Ok(())
}
```

Work on a cloud in memory
-------------------------
```rust,no_run
use lidar_tools::io::dimension::Dimension;
use lidar_tools::{WriterParams, read_point_cloud};

fn main() -> lidar_tools::Result<()> {
    let mut cloud = read_point_cloud("/data/in.laz")?;
    for point in cloud.points.iter_mut() {
        if point.z < 0.0 {
            Dimension::Classification.set(point, &cloud.layout, 7.0)?;
        }
    }
    cloud.write("/out/low_noise.laz", &WriterParams::from_header(&cloud.header)?)
}
```

Error handling
--------------
All public functions return `lidar_tools::Result<T>`; match on `lidar_tools::Error`
to handle specific cases.

```rust,no_run
use lidar_tools::{Error, las_info};

fn main() {
    match las_info("/bad/tile.laz") {
        Ok(info) => println!("{} points", info.point_count),
        Err(Error::Las(e)) => eprintln!("LAS error: {e}"),
        Err(Error::Io(e)) => eprintln!("I/O error: {e}"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`] — one entry point per tool.
- [`core`] — tile arithmetic, writer parameters, geometries and filter expressions.
- [`io`] — LAS/LAZ, GDAL rasters and vectors, WMS client.
- [`types`] — bounds, record formats and extra dimension types.
- [`error`] — crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use core::params::{ExtraDims, WriterParams, get_writer_parameters};
pub use error::{Error, Result};
pub use types::{Bounds, DimensionType, RecordFormat};

// Readers and writers
pub use io::gdal::{GdalError, RasterReader, is_image_white};
pub use io::las::{PointCloud, read_header, read_point_cloud, write_point_cloud};
pub use io::vector::{Feature, VectorLayer, read_vector};

// Tile arithmetic
pub use core::tiles::{
    buffered_bounds_from_filename, infer_tile_origin, neighbor_filenames, parse_filename,
    tile_bbox,
};

// High-level API re-exports
pub use api::{
    BufferParams, ColorParams, VirtualPointsParams, add_points_from_geometry_to_las,
    add_points_in_las, color, compare_las_classification, compare_las_dimensions, compute_count,
    create_las_with_buffer, create_random_laz, las_crop, las_info, las_merge, merge_counts,
    remove_dimensions, rename_dimension, replace_area, replace_values, standardize, transform_geo,
};
