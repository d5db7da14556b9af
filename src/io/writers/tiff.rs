use gdal::raster::{Buffer, ColorInterpretation};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use std::path::Path;

use crate::io::gdal::GdalError;

/// Write a georeferenced multiband u8 GeoTIFF. All bands must share the same
/// (rows, cols) shape; 3 bands are tagged as RGB, anything else as gray.
pub fn write_tiff_bands_u8(
    output: &Path,
    bands: &[Array2<u8>],
    geotransform: [f64; 6],
    epsg: Option<u32>,
) -> Result<Dataset, GdalError> {
    let Some(first) = bands.first() else {
        return Err(GdalError::UnsupportedFormat("No band to write".into()));
    };
    let (rows, cols) = first.dim();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut ds = driver.create_with_band_type::<u8, _>(output, cols, rows, bands.len())?;
    ds.set_geo_transform(&geotransform)?;
    if let Some(code) = epsg {
        ds.set_spatial_ref(&SpatialRef::from_epsg(code)?)?;
    }

    let rgb = [
        ColorInterpretation::RedBand,
        ColorInterpretation::GreenBand,
        ColorInterpretation::BlueBand,
    ];
    for (i, data) in bands.iter().enumerate() {
        if data.dim() != (rows, cols) {
            let (r, c) = data.dim();
            return Err(GdalError::DimensionMismatch(cols, rows, c, r));
        }
        let mut band = ds.rasterband(i + 1)?;
        let interpretation = if bands.len() == 3 {
            rgb[i]
        } else {
            ColorInterpretation::GrayIndex
        };
        band.set_color_interpretation(interpretation)?;
        let mut buf = Buffer::new((cols, rows), data.iter().copied().collect());
        band.write((0, 0), (cols, rows), &mut buf)?;
    }
    Ok(ds)
}
