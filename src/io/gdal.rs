use gdal::raster::ResampleAlg;
use gdal::{Dataset, errors::GdalError as GdalCrateError};
use ndarray::Array2;
use std::path::Path;
use thiserror::Error;

/// Errors encountered when using the GDAL raster and vector adapters
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
    #[error("Non invertible geotransform {0:?}")]
    GeoTransform([f64; 6]),
}

/// Size and georeferencing of a raster
#[derive(Debug, Clone)]
pub struct RasterMetadata {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    pub bands: usize,
    /// [origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height]
    pub geotransform: [f64; 6],
    /// EPSG code of the raster CRS, when it has one
    pub epsg: Option<u32>,
}

/// Reader for orthoimages and other georeferenced rasters via GDAL
pub struct RasterReader {
    pub dataset: Dataset,
    pub metadata: RasterMetadata,
    inverse: [f64; 6],
}

fn invert_geotransform(gt: [f64; 6]) -> Result<[f64; 6], GdalError> {
    let det = gt[1] * gt[5] - gt[2] * gt[4];
    if det == 0.0 || !det.is_finite() {
        return Err(GdalError::GeoTransform(gt));
    }
    let inv_det = 1.0 / det;
    Ok([
        (gt[2] * gt[3] - gt[0] * gt[5]) * inv_det,
        gt[5] * inv_det,
        -gt[2] * inv_det,
        (-gt[1] * gt[3] + gt[0] * gt[4]) * inv_det,
        -gt[4] * inv_det,
        gt[1] * inv_det,
    ])
}

impl RasterReader {
    /// Open a GDAL-supported raster (GeoTIFF, VRT, ...)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdalError> {
        let dataset = Dataset::open(path.as_ref())?;
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GdalError::UnsupportedFormat("No raster bands found".into()));
        }
        // rasters without georeferencing are read in pixel coordinates
        let geotransform = dataset
            .geo_transform()
            .unwrap_or([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let inverse = invert_geotransform(geotransform)?;
        let epsg = dataset
            .spatial_ref()
            .ok()
            .and_then(|srs| srs.auth_code().ok())
            .and_then(|code| u32::try_from(code).ok());
        Ok(RasterReader {
            dataset,
            metadata: RasterMetadata {
                size_x,
                size_y,
                bands,
                geotransform,
                epsg,
            },
            inverse,
        })
    }

    /// Read a single band (1-based index) as an f64 ndarray of shape (height, width)
    pub fn read_band(&self, index: usize) -> Result<Array2<f64>, GdalError> {
        if index == 0 || index > self.metadata.bands {
            return Err(GdalError::UnsupportedFormat(format!(
                "Band index {} out of range",
                index
            )));
        }
        let band = self.dataset.rasterband(index)?;
        let window = (self.metadata.size_x, self.metadata.size_y);
        let buf = band.read_as::<f64>((0, 0), window, window, Some(ResampleAlg::NearestNeighbour))?;
        let data_vec = buf.data().to_vec();
        let len = data_vec.len();
        Array2::from_shape_vec((self.metadata.size_y, self.metadata.size_x), data_vec).map_err(
            |_| {
                GdalError::DimensionMismatch(
                    self.metadata.size_x,
                    self.metadata.size_y,
                    len,
                    1,
                )
            },
        )
    }

    /// Read all bands into a vector of f64 ndarrays
    pub fn read_all_bands(&self) -> Result<Vec<Array2<f64>>, GdalError> {
        let mut result = Vec::with_capacity(self.metadata.bands);
        for idx in 1..=self.metadata.bands {
            result.push(self.read_band(idx)?);
        }
        Ok(result)
    }

    /// (row, col) of the pixel containing a map coordinate, if inside the raster
    pub fn pixel_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let inv = &self.inverse;
        let col = (inv[0] + inv[1] * x + inv[2] * y).floor();
        let row = (inv[3] + inv[4] * x + inv[5] * y).floor();
        if col < 0.0
            || row < 0.0
            || col >= self.metadata.size_x as f64
            || row >= self.metadata.size_y as f64
        {
            return None;
        }
        Some((row as usize, col as usize))
    }

    /// Nearest pixel value of an already read band at a map coordinate
    pub fn sample(&self, band: &Array2<f64>, x: f64, y: f64) -> Option<f64> {
        self.pixel_of(x, y).and_then(|idx| band.get(idx).copied())
    }

    /// Bilinear interpolation between the four pixel centres around a map
    /// coordinate. Border pixels extend up to the raster edge.
    pub fn sample_bilinear(&self, band: &Array2<f64>, x: f64, y: f64) -> Option<f64> {
        self.pixel_of(x, y)?;
        let inv = &self.inverse;
        // position relative to pixel centres
        let u = inv[0] + inv[1] * x + inv[2] * y - 0.5;
        let v = inv[3] + inv[4] * x + inv[5] * y - 0.5;
        let (c0, r0) = (u.floor(), v.floor());
        let (fx, fy) = (u - c0, v - r0);
        let (max_col, max_row) = (self.metadata.size_x - 1, self.metadata.size_y - 1);
        let at = |r: f64, c: f64| {
            let idx = ((r.max(0.0) as usize).min(max_row), (c.max(0.0) as usize).min(max_col));
            band.get(idx).copied()
        };
        let top = at(r0, c0)? * (1.0 - fx) + at(r0, c0 + 1.0)? * fx;
        let bottom = at(r0 + 1.0, c0)? * (1.0 - fx) + at(r0 + 1.0, c0 + 1.0)? * fx;
        Some(top * (1.0 - fy) + bottom * fy)
    }

    /// True when every pixel of every band is 255
    pub fn is_white(&self) -> Result<bool, GdalError> {
        for idx in 1..=self.metadata.bands {
            if self.read_band(idx)?.iter().any(|v| *v != 255.0) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Check whether an image is completely white (all bands at 255)
pub fn is_image_white<P: AsRef<Path>>(path: P) -> Result<bool, GdalError> {
    RasterReader::open(path)?.is_white()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::writers::tiff::write_tiff_bands_u8;
    use ndarray::Array2;

    #[test]
    fn inverse_geotransform_of_north_up_image() {
        let gt = [1000.0, 0.5, 0.0, 2000.0, 0.0, -0.5];
        let inv = invert_geotransform(gt).unwrap();
        let col = inv[0] + inv[1] * 1001.0 + inv[2] * 1999.0;
        let row = inv[3] + inv[4] * 1001.0 + inv[5] * 1999.0;
        assert!((col - 2.0).abs() < 1e-9);
        assert!((row - 2.0).abs() < 1e-9);
        assert!(invert_geotransform([0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn sample_and_white_detection() {
        let dir = tempfile::tempdir().unwrap();
        let white = dir.path().join("white.tif");
        let full = Array2::from_elem((4, 3), 255u8);
        write_tiff_bands_u8(
            &white,
            &[full.clone(), full.clone()],
            [0.0, 1.0, 0.0, 4.0, 0.0, -1.0],
            None,
        )
        .unwrap();
        assert!(is_image_white(&white).unwrap());

        let gray = dir.path().join("gray.tif");
        let mut band = full;
        band[[3, 0]] = 12;
        write_tiff_bands_u8(
            &gray,
            &[band],
            [0.0, 1.0, 0.0, 4.0, 0.0, -1.0],
            Some(2154),
        )
        .unwrap();
        assert!(!is_image_white(&gray).unwrap());

        let reader = RasterReader::open(&gray).unwrap();
        assert_eq!(reader.metadata.epsg, Some(2154));
        let values = reader.read_band(1).unwrap();
        assert_eq!(reader.sample(&values, 0.5, 0.5), Some(12.0));
        assert_eq!(reader.sample(&values, 2.5, 3.5), Some(255.0));
        assert_eq!(reader.sample(&values, 3.5, 0.5), None);

        assert_eq!(reader.sample_bilinear(&values, 0.5, 0.5), Some(12.0));
        assert_eq!(reader.sample_bilinear(&values, 1.0, 0.5), Some(133.5));
        assert_eq!(reader.sample_bilinear(&values, 0.1, 0.2), Some(12.0));
        assert_eq!(reader.sample_bilinear(&values, 2.5, 3.0), Some(255.0));
        assert_eq!(reader.sample_bilinear(&values, 3.5, 0.5), None);
        assert!(reader.read_band(2).is_err());
    }
}
