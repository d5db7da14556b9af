//! Core building blocks: writer parameters, tile arithmetic, vector
//! geometries and point filter expressions. These are internal primitives
//! consumed by the high-level `api` module.
pub mod expression;
pub mod geometry;
pub mod params;
pub mod tiles;
