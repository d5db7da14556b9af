//! Point cloud colorization from Géoplateforme orthoimages (RGB and infrared)
//! and from a local vegetation raster.
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::api::download_image::{DownloadParams, download_image_from_source};
use crate::api::las_info::{bounds_from_header, epsg_from_header};
use crate::core::params::{ExtraDimSpec, ExtraDims, WriterParams};
use crate::error::{Error, Result};
use crate::io::dimension::Dimension;
use crate::io::gdal::RasterReader;
use crate::io::las::{PointCloud, read_point_cloud};
use crate::io::wms::{GeoplateformeWms, ImageSource, Retry};
use crate::types::{Bounds, DimensionType};

pub const STREAM_RGB: &str = "ORTHOIMAGERY.ORTHOPHOTOS";
pub const STREAM_IRC: &str = "ORTHOIMAGERY.ORTHOPHOTOS.IRC";

/// 8-bit image values are stored on the 16-bit range of the color fields
const COLOR_FACTOR: f64 = 256.0;

#[derive(Debug, Clone)]
pub struct ColorParams {
    /// EPSG code of the requested images; the file's own CRS when `None`
    pub proj: Option<u32>,
    pub pixel_per_meter: f64,
    pub timeout: Duration,
    pub rgb: bool,
    pub irc: bool,
    /// Local raster whose first band fills `vegetation_dim`
    pub vegetation: Option<PathBuf>,
    pub vegetation_dim: String,
    pub check_images: bool,
    pub stream_rgb: String,
    pub stream_irc: String,
    /// Largest image side requested at once, in pixels
    pub size_max: usize,
}

impl Default for ColorParams {
    fn default() -> Self {
        Self {
            proj: None,
            pixel_per_meter: 5.0,
            timeout: Duration::from_secs(300),
            rgb: true,
            irc: true,
            vegetation: None,
            vegetation_dim: "Deviation".to_string(),
            check_images: false,
            stream_rgb: STREAM_RGB.to_string(),
            stream_irc: STREAM_IRC.to_string(),
            size_max: 5000,
        }
    }
}

/// Downloaded images. They are deleted when dropped; use
/// [`NamedTempFile::persist`] to keep them.
#[derive(Debug, Default)]
pub struct ColorImages {
    pub rgb: Option<NamedTempFile>,
    pub irc: Option<NamedTempFile>,
}

/// Round an interval outwards to whole pixels, with one more pixel on each side
/// so that no point lies on the edge of the image
pub fn match_min_max_with_pixel_size(min_d: f64, max_d: f64, pixel_per_meter: f64) -> (f64, f64) {
    (
        ((min_d * pixel_per_meter).ceil() - 1.0) / pixel_per_meter,
        ((max_d * pixel_per_meter).floor() + 1.0) / pixel_per_meter,
    )
}

/// Copy raster bands onto point dimensions, scaled by `factor`. Points outside
/// the raster keep their value.
fn apply_raster(
    cloud: &mut PointCloud,
    raster: &Path,
    mapping: &[(usize, Dimension)],
    factor: f64,
) -> Result<()> {
    let reader = RasterReader::open(raster)?;
    let mut outside = 0usize;
    for (band_index, dim) in mapping {
        let band = reader.read_band(*band_index)?;
        for point in cloud.points.iter_mut() {
            match reader.sample(&band, point.x, point.y) {
                Some(value) => dim.set(point, &cloud.layout, value * factor)?,
                None => outside += 1,
            }
        }
    }
    if outside > 0 {
        warn!(
            "{} samples outside {} were left unchanged",
            outside,
            raster.display()
        );
    }
    Ok(())
}

fn download_to_temp(
    source: &dyn ImageSource,
    retry: &Retry,
    params: &ColorParams,
    proj: u32,
    bounds: Bounds,
    layer: &str,
    suffix: &str,
) -> Result<NamedTempFile> {
    let image = tempfile::Builder::new().suffix(suffix).tempfile()?;
    let download = DownloadParams {
        proj,
        layer: layer.to_string(),
        bounds,
        pixel_per_meter: params.pixel_per_meter,
        timeout: params.timeout,
        check_images: params.check_images,
        size_max: params.size_max,
    };
    let requests = download_image_from_source(source, retry, &download, image.path())?;
    info!("Downloaded {} in {} request(s)", layer, requests);
    Ok(image)
}

/// Colorize with images from the Géoplateforme WMS
pub fn color<P: AsRef<Path>, Q: AsRef<Path>>(
    input_file: P,
    output_file: Q,
    params: &ColorParams,
) -> Result<ColorImages> {
    let wms = GeoplateformeWms::new(params.timeout)?;
    color_from_source(&wms, &Retry::default(), input_file, output_file, params)
}

/// Colorize with images from any image source. The output is LAS 1.4, record
/// format 8; when a vegetation raster is given its dimension is the only extra
/// dimension written.
pub fn color_from_source<P: AsRef<Path>, Q: AsRef<Path>>(
    source: &dyn ImageSource,
    retry: &Retry,
    input_file: P,
    output_file: Q,
    params: &ColorParams,
) -> Result<ColorImages> {
    let mut cloud = read_point_cloud(&input_file)?;
    let header_bounds = bounds_from_header(&cloud.header);
    let ppm = params.pixel_per_meter;
    if ppm <= 0.0 {
        return Err(Error::InvalidArgument {
            arg: "pixel_per_meter",
            value: ppm.to_string(),
        });
    }
    let (minx, maxx) = match_min_max_with_pixel_size(header_bounds.minx, header_bounds.maxx, ppm);
    let (miny, maxy) = match_min_max_with_pixel_size(header_bounds.miny, header_bounds.maxy, ppm);
    let bounds = Bounds::new(minx, maxx, miny, maxy);
    let proj = match params.proj {
        Some(proj) => proj,
        None => epsg_from_header(&cloud.header)? as u32,
    };

    let mut writer_params = WriterParams::from_header(&cloud.header)?;
    writer_params.major_version = 1;
    writer_params.minor_version = 4;
    writer_params.dataformat_id = 8;

    if let Some(vegetation) = &params.vegetation {
        info!(
            "Filling {} from {}",
            params.vegetation_dim,
            vegetation.display()
        );
        let dim = Dimension::parse(&params.vegetation_dim);
        if dim.is_extra() && !cloud.has_dimension(&dim) {
            cloud.add_dimension(&params.vegetation_dim, DimensionType::Uint16)?;
        }
        apply_raster(&mut cloud, vegetation, &[(1, dim)], COLOR_FACTOR)?;
        writer_params.extra_dims = ExtraDims::Selected(vec![ExtraDimSpec {
            name: params.vegetation_dim.clone(),
            data_type: DimensionType::Uint16,
        }]);
    }

    let mut images = ColorImages::default();
    if params.rgb {
        let image = download_to_temp(
            source,
            retry,
            params,
            proj,
            bounds,
            &params.stream_rgb,
            "_rvb.tif",
        )?;
        apply_raster(
            &mut cloud,
            image.path(),
            &[(1, Dimension::Red), (2, Dimension::Green), (3, Dimension::Blue)],
            COLOR_FACTOR,
        )?;
        images.rgb = Some(image);
    }
    if params.irc {
        let image = download_to_temp(
            source,
            retry,
            params,
            proj,
            bounds,
            &params.stream_irc,
            "_irc.tif",
        )?;
        apply_raster(&mut cloud, image.path(), &[(1, Dimension::Infrared)], COLOR_FACTOR)?;
        images.irc = Some(image);
    }

    info!("Writing colorized point cloud {}", output_file.as_ref().display());
    cloud.write(output_file, &writer_params)?;
    Ok(images)
}
