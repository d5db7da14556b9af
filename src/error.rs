//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts underlying I/O, LAS, GDAL, JSON and WMS errors, and provides semantic
//! variants for tile naming, CRS lookup, dimension and geometry failures.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LAS error: {0}")]
    Las(#[from] las::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] crate::io::GdalError),

    #[error("WMS error: {0}")]
    Wms(#[from] crate::io::WmsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error(
        "Filename {0} does not have the expected format. Expected prefix1_prefix2_coordx_coordy_suffix"
    )]
    InvalidTileName(String),

    #[error(
        "Could not find tile origin because it does not match the expected tile width \
         (x: [{tile_x_min}, {tile_x_max}], y: [{tile_y_min}, {tile_y_max}], width: {tile_width})"
    )]
    TileOrigin {
        tile_x_min: i64,
        tile_x_max: i64,
        tile_y_min: i64,
        tile_y_max: i64,
        tile_width: f64,
    },

    #[error("List of valid tiles is empty : stop processing")]
    EmptyTileList,

    #[error("EPSG could not be inferred from metadata: {0}")]
    MissingEpsg(String),

    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    #[error("{0}")]
    Dimension(String),

    #[error("{0}")]
    Geometry(String),

    #[error("Invalid expression '{expression}': {message}")]
    Expression { expression: String, message: String },

    #[error("Processing error: {0}")]
    Processing(String),
}

