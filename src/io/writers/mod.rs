pub mod tiff;
pub use tiff::write_tiff_bands_u8;
