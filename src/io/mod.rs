//! I/O layer: LAS/LAZ point clouds and their dimensions, GDAL-backed rasters
//! and vector files, the WMS orthoimagery client, and GeoTIFF writers.
pub mod dimension;
pub mod extra_bytes;
pub mod las;
pub use las::{PointCloud, read_header, read_point_cloud, write_point_cloud};

pub mod gdal;
pub use gdal::{GdalError, RasterMetadata, RasterReader, is_image_white};

pub mod vector;
pub use vector::{Feature, VectorLayer, read_vector, write_geojson};

pub mod wms;
pub use wms::{GeoplateformeWms, GetMapRequest, ImageSource, WmsError};

pub mod writers;
