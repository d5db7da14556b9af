//! Orthoimage download from the Géoplateforme WMS. Large extents are paved
//! into cells no larger than `size_max` pixels, downloaded one by one and
//! mosaicked into a single GeoTIFF.
use std::path::Path;
use std::time::Duration;

use ndarray::{Array2, s};
use tracing::{debug, info};

use crate::error::Result;
use crate::io::gdal::{GdalError, RasterReader, is_image_white};
use crate::io::wms::{GeoplateformeWms, GetMapRequest, ImageSource, Retry, WmsError};
use crate::io::writers::write_tiff_bands_u8;
use crate::types::Bounds;

#[derive(Debug, Clone)]
pub struct DownloadParams {
    /// EPSG code of the image
    pub proj: u32,
    /// WMS layer, e.g. `ORTHOIMAGERY.ORTHOPHOTOS`
    pub layer: String,
    pub bounds: Bounds,
    pub pixel_per_meter: f64,
    pub timeout: Duration,
    /// Fail on completely white images (no data on the server)
    pub check_images: bool,
    /// Largest image side requested at once, in pixels
    pub size_max: usize,
}

/// `(nb_pixels, nb_cells, cell_size)` along one axis. Cells have an integer
/// size in pixels so that paved images stay phased with an unpaved one.
pub fn compute_cells_size(
    mind: f64,
    maxd: f64,
    pixel_per_meter: f64,
    size_max: usize,
) -> (usize, usize, usize) {
    let nb_pixels = ((maxd - mind) * pixel_per_meter).ceil().max(0.0) as usize;
    let nb_cells = nb_pixels.div_ceil(size_max.max(1)).max(1);
    let cell_size = nb_pixels.div_ceil(nb_cells);
    (nb_pixels, nb_cells, cell_size)
}

fn fetch_checked(
    source: &dyn ImageSource,
    retry: &Retry,
    request: &GetMapRequest,
    outfile: &Path,
    check_images: bool,
) -> Result<()> {
    retry.run(|| source.fetch(request, outfile))?;
    if check_images && is_image_white(outfile)? {
        return Err(WmsError::WhiteImage(request.layer.clone()).into());
    }
    Ok(())
}

/// Download with the Géoplateforme WMS client. Returns the number of requests.
pub fn download_image<P: AsRef<Path>>(params: &DownloadParams, outfile: P) -> Result<usize> {
    let wms = GeoplateformeWms::new(params.timeout)?;
    download_image_from_source(&wms, &Retry::default(), params, outfile)
}

/// Download from any image source. Returns the number of requests.
pub fn download_image_from_source<P: AsRef<Path>>(
    source: &dyn ImageSource,
    retry: &Retry,
    params: &DownloadParams,
    outfile: P,
) -> Result<usize> {
    let outfile = outfile.as_ref();
    let b = params.bounds;
    let ppm = params.pixel_per_meter;
    let (size_x, nb_cells_x, cell_size_x) = compute_cells_size(b.minx, b.maxx, ppm, params.size_max);
    let (size_y, nb_cells_y, cell_size_y) = compute_cells_size(b.miny, b.maxy, ppm, params.size_max);

    if size_x <= params.size_max && size_y <= params.size_max {
        let request = GetMapRequest {
            proj: params.proj,
            layer: params.layer.clone(),
            bbox: b,
            width: cell_size_x,
            height: cell_size_y,
        };
        fetch_checked(source, retry, &request, outfile, params.check_images)?;
        return Ok(1);
    }

    info!(
        "Paving {}x{} pixels into {}x{} cells of {}x{} pixels",
        size_x, size_y, nb_cells_x, nb_cells_y, cell_size_x, cell_size_y
    );
    let tmp_dir = tempfile::tempdir()?;
    let mut mosaic: Vec<Array2<u8>> = Vec::new();
    for line in 0..nb_cells_y {
        for col in 0..nb_cells_x {
            // the last line and column can be smaller than the others
            let width = cell_size_x.min(size_x - col * cell_size_x);
            let height = cell_size_y.min(size_y - line * cell_size_y);
            let minx = b.minx + (col * cell_size_x) as f64 / ppm;
            let miny = b.miny + (line * cell_size_y) as f64 / ppm;
            let request = GetMapRequest {
                proj: params.proj,
                layer: params.layer.clone(),
                bbox: Bounds::new(
                    minx,
                    minx + width as f64 / ppm,
                    miny,
                    miny + height as f64 / ppm,
                ),
                width,
                height,
            };
            let cell_path = tmp_dir.path().join(format!("cell_{}_{}.tif", col, line));
            fetch_checked(source, retry, &request, &cell_path, params.check_images)?;

            let bands = RasterReader::open(&cell_path)?.read_all_bands()?;
            if mosaic.is_empty() {
                mosaic = vec![Array2::zeros((size_y, size_x)); bands.len()];
            }
            // lines are counted from the bottom of the image
            let row0 = size_y - (line * cell_size_y + height);
            let col0 = col * cell_size_x;
            for (target, band) in mosaic.iter_mut().zip(&bands) {
                if band.dim() != (height, width) {
                    let (r, c) = band.dim();
                    return Err(GdalError::DimensionMismatch(width, height, c, r).into());
                }
                target
                    .slice_mut(s![row0..row0 + height, col0..col0 + width])
                    .assign(&band.mapv(|v| v.clamp(0.0, 255.0) as u8));
            }
            debug!("Cell {} {} placed at row {} col {}", col, line, row0, col0);
        }
    }

    let geotransform = [
        b.minx,
        1.0 / ppm,
        0.0,
        b.miny + size_y as f64 / ppm,
        0.0,
        -1.0 / ppm,
    ];
    write_tiff_bands_u8(outfile, &mosaic, geotransform, Some(params.proj))?;
    Ok(nb_cells_x * nb_cells_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Writes 3-band images whose value encodes the cell position
    struct FakeSource {
        cell: (f64, f64),
        white: bool,
        requests: RefCell<Vec<GetMapRequest>>,
    }

    impl FakeSource {
        fn new(cell: (f64, f64)) -> Self {
            Self {
                cell,
                white: false,
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl ImageSource for FakeSource {
        fn fetch(&self, request: &GetMapRequest, outfile: &Path) -> std::result::Result<(), WmsError> {
            self.requests.borrow_mut().push(request.clone());
            let col = (request.bbox.minx / self.cell.0).round() as u8;
            let line = (request.bbox.miny / self.cell.1).round() as u8;
            let value = if self.white { 255 } else { col * 10 + line };
            let band = Array2::from_elem((request.height, request.width), value);
            let px = request.bbox.width() / request.width as f64;
            write_tiff_bands_u8(
                outfile,
                &[band.clone(), band.clone(), band],
                [request.bbox.minx, px, 0.0, request.bbox.maxy, 0.0, -px],
                Some(request.proj),
            )
            .map_err(|e| WmsError::Exception(e.to_string()))?;
            Ok(())
        }
    }

    fn params(bounds: Bounds, size_max: usize) -> DownloadParams {
        DownloadParams {
            proj: 2154,
            layer: "ORTHOIMAGERY.ORTHOPHOTOS".into(),
            bounds,
            pixel_per_meter: 1.0,
            timeout: Duration::from_secs(5),
            check_images: true,
            size_max,
        }
    }

    fn no_sleep() -> Retry {
        Retry {
            sleep: false,
            ..Default::default()
        }
    }

    #[test]
    fn cells_size() {
        assert_eq!(compute_cells_size(0.0, 100.0, 1.0, 40), (100, 3, 34));
        assert_eq!(compute_cells_size(0.0, 60.0, 1.0, 40), (60, 2, 30));
        assert_eq!(compute_cells_size(0.0, 1000.0, 5.0, 5000), (5000, 1, 5000));
        assert_eq!(compute_cells_size(0.0, 5001.0, 1.0, 5000), (5001, 2, 2501));
    }

    #[test]
    fn single_request_under_size_max() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("ortho.tif");
        let source = FakeSource::new((1.0, 1.0));
        let n = download_image_from_source(
            &source,
            &no_sleep(),
            &params(Bounds::new(0.0, 30.0, 0.0, 20.0), 40),
            &out,
        )
        .unwrap();
        assert_eq!(n, 1);
        let requests = source.requests.borrow();
        assert_eq!((requests[0].width, requests[0].height), (30, 20));
        assert!(out.exists());
    }

    #[test]
    fn paving_is_mosaicked_bottom_up() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("ortho.tif");
        let source = FakeSource::new((34.0, 30.0));
        let n = download_image_from_source(
            &source,
            &no_sleep(),
            &params(Bounds::new(0.0, 100.0, 0.0, 60.0), 40),
            &out,
        )
        .unwrap();
        assert_eq!(n, 6);
        let requests = source.requests.borrow();
        assert_eq!(requests.len(), 6);
        assert_eq!(requests[2].width, 32);
        assert_eq!(requests[2].bbox, Bounds::new(68.0, 100.0, 0.0, 30.0));
        assert_eq!(requests[3].bbox, Bounds::new(0.0, 34.0, 30.0, 60.0));

        let reader = RasterReader::open(&out).unwrap();
        assert_eq!((reader.metadata.size_x, reader.metadata.size_y), (100, 60));
        assert_eq!(reader.metadata.geotransform[3], 60.0);
        let band = reader.read_band(1).unwrap();
        // top left is the first column of the upper line
        assert_eq!(band[[0, 0]], 1.0);
        assert_eq!(band[[59, 99]], 20.0);
        assert_eq!(band[[45, 40]], 10.0);
    }

    #[test]
    fn white_images_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::new((1.0, 1.0));
        source.white = true;
        let err = download_image_from_source(
            &source,
            &no_sleep(),
            &params(Bounds::new(0.0, 10.0, 0.0, 10.0), 40),
            dir.path().join("white.tif"),
        )
        .unwrap_err();
        assert!(
            err.to_string()
                .contains("Downloaded image is white, with stream: ORTHOIMAGERY.ORTHOPHOTOS")
        );
        assert_eq!(source.requests.borrow().len(), 1);
    }
}
