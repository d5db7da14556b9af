//! In-memory point clouds read from and written to LAS/LAZ files.
//!
//! Writing goes through [`WriterParams`]: the output header starts from the
//! cloud's own header (VLRs, system identifier, dates) and gets the requested
//! version, encoding, record format, scales, offsets, CRS and extra dimensions.
use std::path::{Path, PathBuf};

use las::point::Format;
use las::{Builder, Header, Point, Reader, Transform, Vector, Version, Vlr, Writer};
use tracing::{debug, warn};

use crate::core::params::{ExtraDims, WriterParams};
use crate::error::{Error, Result};
use crate::io::dimension::Dimension;
use crate::io::extra_bytes::{ExtraBytesLayout, is_extra_bytes_vlr};
use crate::types::{Bounds, DimensionType};

const PROJECTION_USER_ID: &str = "LASF_Projection";
const WKT_RECORD_ID: u16 = 2112;
const LASZIP_USER_ID: &str = "laszip encoded";
const WKT_BIT: u16 = 1 << 4;

/// Decoded points with the header and extra bytes layout they were read with
#[derive(Debug, Clone)]
pub struct PointCloud {
    pub header: Header,
    pub layout: ExtraBytesLayout,
    pub points: Vec<Point>,
}

impl PointCloud {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_point_cloud(path)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// XY extent of the points (not of the header)
    pub fn bounds(&self) -> Option<Bounds> {
        let first = self.points.first()?;
        let init = Bounds::new(first.x, first.x, first.y, first.y);
        Some(self.points.iter().fold(init, |b, p| Bounds {
            minx: b.minx.min(p.x),
            maxx: b.maxx.max(p.x),
            miny: b.miny.min(p.y),
            maxy: b.maxy.max(p.y),
        }))
    }

    pub fn epsg(&self) -> Option<u16> {
        epsg_of(&self.header)
    }

    /// Standard dimensions of the record format followed by the extra dimensions
    pub fn dimensions(&self) -> Vec<Dimension> {
        let mut dims = Dimension::standard_for_format(self.header.point_format());
        dims.extend(self.layout.names().into_iter().map(Dimension::Extra));
        dims
    }

    pub fn has_dimension(&self, dim: &Dimension) -> bool {
        match dim {
            Dimension::Extra(name) => self.layout.find(name).is_some(),
            _ => self.dimensions().contains(dim),
        }
    }

    /// Value of a dimension for every point, zero where a point does not carry it
    pub fn values(&self, dim: &Dimension) -> Vec<f64> {
        self.points
            .iter()
            .map(|p| dim.get(p, &self.layout).unwrap_or(0.0))
            .collect()
    }

    /// Append an extra dimension, zero-filled on every point
    pub fn add_dimension(&mut self, name: &str, data_type: DimensionType) -> Result<()> {
        let mut layout = self.layout.clone();
        layout.push(name, data_type)?;
        self.set_layout(layout);
        Ok(())
    }

    /// Switch to another extra bytes layout, carrying values over by name
    pub fn set_layout(&mut self, layout: ExtraBytesLayout) {
        for point in self.points.iter_mut() {
            self.layout.remap(&layout, point);
        }
        self.layout = layout;
    }

    pub fn write<P: AsRef<Path>>(&self, path: P, params: &WriterParams) -> Result<()> {
        write_point_cloud(path, self, params)
    }
}

pub fn read_header<P: AsRef<Path>>(path: P) -> Result<Header> {
    let reader = Reader::from_path(path)?;
    Ok(reader.header().clone())
}

pub fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let mut reader = Reader::from_path(path.as_ref())?;
    let header = reader.header().clone();
    let layout = ExtraBytesLayout::from_header(&header)?;
    let points = reader.points().collect::<las::Result<Vec<_>>>()?;
    debug!(
        "Read {} points from {}",
        points.len(),
        path.as_ref().display()
    );
    Ok(PointCloud {
        header,
        layout,
        points,
    })
}

/// Ordered names of the dimensions present in a cloud
pub fn list_dims(cloud: &PointCloud) -> Vec<String> {
    cloud
        .dimensions()
        .iter()
        .map(|d| d.name().to_string())
        .collect()
}

fn is_projection_vlr(vlr: &Vlr) -> bool {
    vlr.user_id.eq_ignore_ascii_case(PROJECTION_USER_ID)
        && matches!(vlr.record_id, 2111 | 2112 | 34735..=34737)
}

fn is_wkt_vlr(vlr: &Vlr) -> bool {
    vlr.user_id.eq_ignore_ascii_case(PROJECTION_USER_ID) && vlr.record_id == WKT_RECORD_ID
}

fn is_laszip_vlr(vlr: &Vlr) -> bool {
    vlr.user_id.eq_ignore_ascii_case(LASZIP_USER_ID)
}

// Last EPSG authority of a WKT string; for a projected CRS this is the CRS itself
fn parse_epsg(wkt: &str) -> Option<u16> {
    for key in ["AUTHORITY[\"EPSG\",\"", "ID[\"EPSG\","] {
        if let Some(idx) = wkt.rfind(key) {
            let start = idx + key.len();
            let digits: String = wkt[start..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if let Ok(code) = digits.parse() {
                return Some(code);
            }
        }
    }
    None
}

/// Horizontal EPSG code of a header, from its GeoTIFF keys or WKT record
pub fn epsg_of(header: &Header) -> Option<u16> {
    if let Ok(Some(crs)) = header.get_epsg_crs() {
        return Some(crs.horizontal);
    }
    header
        .all_vlrs()
        .find(|vlr| is_wkt_vlr(vlr))
        .and_then(|vlr| parse_epsg(&String::from_utf8_lossy(&vlr.data)))
}

/// EPSG code of a spatial reference string such as `EPSG:2154` or `2154`
pub fn parse_srs(srs: &str) -> Result<u16> {
    let code = srs.trim();
    let code = code
        .get(..5)
        .filter(|prefix| prefix.eq_ignore_ascii_case("EPSG:"))
        .map_or(code, |_| &code[5..]);
    code.trim()
        .parse()
        .map_err(|_| Error::InvalidCrs(srs.to_string()))
}

/// WKT definition of an EPSG code
pub fn wkt_for_epsg(code: u16) -> Result<&'static str> {
    crs_definitions::from_code(code)
        .map(|def| def.wkt)
        .ok_or_else(|| Error::InvalidCrs(format!("EPSG:{}", code)))
}

/// `.las` and `.laz` files of a directory, sorted by name
pub fn las_file_paths<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_las_extension(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

pub fn has_las_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("las") || e.eq_ignore_ascii_case("laz"))
}

fn is_laz_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("laz"))
}

/// Extra bytes layout written for a cloud with the given `extra_dims` option
fn target_layout(cloud: &PointCloud, extra_dims: &ExtraDims) -> Result<ExtraBytesLayout> {
    match extra_dims {
        ExtraDims::All(_) => Ok(cloud.layout.clone()),
        ExtraDims::Selected(specs) => {
            let mut layout = ExtraBytesLayout::default();
            for spec in specs {
                if cloud.layout.find(&spec.name).is_none() {
                    return Err(Error::Dimension(format!(
                        "Dimension {} not found in point cloud",
                        spec.name
                    )));
                }
                layout.push(&spec.name, spec.data_type)?;
            }
            Ok(layout)
        }
    }
}

fn axis_minimum(points: &[Point], axis: fn(&Point) -> f64) -> Option<f64> {
    points.iter().map(axis).reduce(f64::min)
}

fn forwarded_vlrs<'a>(
    vlrs: impl IntoIterator<Item = &'a Vlr>,
    keep_crs: bool,
    supports_wkt: bool,
) -> Vec<Vlr> {
    vlrs.into_iter()
        .filter(|vlr| {
            !is_extra_bytes_vlr(vlr)
                && !is_laszip_vlr(vlr)
                && (keep_crs || !is_projection_vlr(vlr))
                && (supports_wkt || !is_wkt_vlr(vlr))
        })
        .cloned()
        .collect()
}

fn build_header(
    cloud: &PointCloud,
    layout: &ExtraBytesLayout,
    params: &WriterParams,
    compress: bool,
) -> Result<Header> {
    if matches!(params.dataformat_id, 4 | 5 | 9 | 10) {
        return Err(Error::InvalidArgument {
            arg: "dataformat_id",
            value: format!("{} (waveform formats are not supported)", params.dataformat_id),
        });
    }
    let crs_wkt = params
        .a_srs
        .as_deref()
        .map(|srs| parse_srs(srs).and_then(wkt_for_epsg))
        .transpose()?;

    let mut version = Version::new(params.major_version, params.minor_version);
    if crs_wkt.is_some() && version < Version::new(1, 4) {
        debug!("Upgrading output to LAS 1.4 to store a WKT CRS");
        version = Version::new(1, 4);
    }
    let supports_wkt = version >= Version::new(1, 4);

    let template = &cloud.header;
    let keep_crs = crs_wkt.is_none();
    let mut vlrs = forwarded_vlrs(template.vlrs(), keep_crs, supports_wkt);
    let evlrs = if supports_wkt {
        forwarded_vlrs(template.evlrs(), keep_crs, supports_wkt)
    } else {
        Vec::new()
    };
    vlrs.extend(layout.to_vlr());
    if let Some(wkt) = crs_wkt {
        let mut data = wkt.as_bytes().to_vec();
        data.push(0);
        vlrs.push(Vlr {
            user_id: PROJECTION_USER_ID.to_string(),
            record_id: WKT_RECORD_ID,
            description: "OGC COORDINATE SYSTEM WKT".to_string(),
            data,
        });
    }
    let has_wkt = supports_wkt && vlrs.iter().chain(&evlrs).any(is_wkt_vlr);

    let mut raw = template.clone().into_raw()?;
    raw.version = version;
    raw.global_encoding = params.global_encoding & !WKT_BIT;
    let mut builder = Builder::new(raw)?;
    builder.version = version;
    builder.has_wkt_crs = has_wkt;

    let mut format = Format::new(params.dataformat_id)?;
    format.extra_bytes = layout.record_length();
    format.is_compressed = compress;
    builder.point_format = format;

    builder.transforms = Vector {
        x: Transform {
            scale: params.scale_x,
            offset: params.offset_x.resolve(axis_minimum(&cloud.points, |p| p.x)),
        },
        y: Transform {
            scale: params.scale_y,
            offset: params.offset_y.resolve(axis_minimum(&cloud.points, |p| p.y)),
        },
        z: Transform {
            scale: params.scale_z,
            offset: params.offset_z.resolve(axis_minimum(&cloud.points, |p| p.z)),
        },
    };
    builder.vlrs = vlrs;
    builder.evlrs = evlrs;
    Ok(builder.into_header()?)
}

/// Make a point carry exactly the fields of the target record format
fn conform_point(point: &mut Point, format: &Format) {
    point.gps_time = format.has_gps_time.then(|| point.gps_time.unwrap_or(0.0));
    point.color = if format.has_color {
        Some(point.color.unwrap_or_default())
    } else {
        None
    };
    point.nir = format.has_nir.then(|| point.nir.unwrap_or(0));
    point.waveform = None;
    if !format.is_extended {
        point.scanner_channel = 0;
    }
    point
        .extra_bytes
        .resize(format.extra_bytes as usize, 0);
}

/// Write a cloud; LAZ compression follows the output extension
pub fn write_point_cloud<P: AsRef<Path>>(
    path: P,
    cloud: &PointCloud,
    params: &WriterParams,
) -> Result<()> {
    let path = path.as_ref();
    let compress = is_laz_path(path);
    if compress != params.compression {
        warn!(
            "compression={} does not match the extension of {}, writing {}",
            params.compression,
            path.display(),
            if compress { "LAZ" } else { "LAS" }
        );
    }
    let layout = target_layout(cloud, &params.extra_dims)?;
    let header = build_header(cloud, &layout, params, compress)?;
    let format = *header.point_format();

    let mut writer = Writer::from_path(path, header)?;
    for point in &cloud.points {
        let mut point = point.clone();
        cloud.layout.remap(&layout, &mut point);
        conform_point(&mut point, &format);
        writer.write_point(point)?;
    }
    writer.close()?;
    debug!("Wrote {} points to {}", cloud.len(), path.display());
    Ok(())
}
