//! Vector files (GeoJSON, Shapefile, GeoPackage, ...) read through GDAL/OGR
//! into [`Geometry3D`] features, and GeoJSON output.
use std::path::Path;

use gdal::Dataset;
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::vector::{FieldValue, Geometry, LayerAccess};
use gdal_sys::OGRwkbGeometryType;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::core::geometry::{Coord3, Geometry3D};
use crate::error::{Error, Result};

const WKB_25D_BIT: u32 = 0x8000_0000;

/// One feature of a vector layer
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry3D,
    /// True when the source geometry carries Z coordinates
    pub has_z: bool,
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry3D, has_z: bool) -> Self {
        Self {
            geometry,
            has_z,
            properties: Map::new(),
        }
    }

    /// Numeric value of a property; numeric strings are accepted
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.properties.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Features of the first layer of a vector file
#[derive(Debug, Clone, Default)]
pub struct VectorLayer {
    pub features: Vec<Feature>,
    /// Horizontal EPSG code of the layer, when it has one
    pub epsg: Option<u32>,
}

fn flatten_type(raw: OGRwkbGeometryType::Type) -> OGRwkbGeometryType::Type {
    (raw & !WKB_25D_BIT) % 1000
}

fn type_has_z(raw: OGRwkbGeometryType::Type) -> bool {
    raw & WKB_25D_BIT != 0 || matches!((raw & !WKB_25D_BIT) / 1000, 1 | 3)
}

fn coords_of(geometry: &Geometry) -> Vec<Coord3> {
    geometry
        .get_point_vec()
        .into_iter()
        .map(|(x, y, z)| Coord3::new(x, y, z))
        .collect()
}

fn parts_of(geometry: &Geometry) -> Vec<Geometry> {
    (0..geometry.geometry_count())
        .map(|i| (*geometry.get_geometry(i)).clone())
        .collect()
}

/// Convert an OGR geometry
pub fn geometry_from_ogr(geometry: &Geometry) -> Result<Geometry3D> {
    let raw = geometry.geometry_type();
    Ok(match flatten_type(raw) {
        OGRwkbGeometryType::wkbPoint => {
            let coord = coords_of(geometry)
                .first()
                .copied()
                .ok_or_else(|| Error::Geometry("Empty point in the input Geometry file.".into()))?;
            Geometry3D::Point(coord)
        }
        OGRwkbGeometryType::wkbMultiPoint => Geometry3D::MultiPoint(
            parts_of(geometry)
                .iter()
                .flat_map(coords_of)
                .collect(),
        ),
        OGRwkbGeometryType::wkbLineString | OGRwkbGeometryType::wkbLinearRing => {
            Geometry3D::LineString(coords_of(geometry))
        }
        OGRwkbGeometryType::wkbMultiLineString => {
            Geometry3D::MultiLineString(parts_of(geometry).iter().map(coords_of).collect())
        }
        OGRwkbGeometryType::wkbPolygon => {
            Geometry3D::Polygon(parts_of(geometry).iter().map(coords_of).collect())
        }
        OGRwkbGeometryType::wkbMultiPolygon => Geometry3D::MultiPolygon(
            parts_of(geometry)
                .iter()
                .map(|polygon| parts_of(polygon).iter().map(coords_of).collect())
                .collect(),
        ),
        OGRwkbGeometryType::wkbGeometryCollection => Geometry3D::GeometryCollection(
            parts_of(geometry)
                .iter()
                .map(geometry_from_ogr)
                .collect::<Result<_>>()?,
        ),
        _ => {
            return Err(Error::Geometry(
                "Unsupported geometry type in the input Geometry file.".into(),
            ));
        }
    })
}

fn field_to_json(value: FieldValue) -> Value {
    match value {
        FieldValue::IntegerValue(v) => json!(v),
        FieldValue::Integer64Value(v) => json!(v),
        FieldValue::RealValue(v) => json!(v),
        FieldValue::StringValue(v) => json!(v),
        other => other.into_string().map(Value::String).unwrap_or(Value::Null),
    }
}

fn epsg_of_srs(srs: &SpatialRef) -> Option<u32> {
    match (srs.auth_name(), srs.auth_code()) {
        (Ok(name), Ok(code)) if name.eq_ignore_ascii_case("EPSG") => u32::try_from(code).ok(),
        _ => None,
    }
}

/// Read every feature of the first layer. Features without geometry are skipped.
pub fn read_vector<P: AsRef<Path>>(path: P) -> Result<VectorLayer> {
    let path = path.as_ref();
    let dataset = Dataset::open(path).map_err(crate::io::GdalError::from)?;
    let mut layer = dataset.layer(0).map_err(crate::io::GdalError::from)?;
    let epsg = layer.spatial_ref().as_ref().and_then(epsg_of_srs);

    let mut features = Vec::new();
    for feature in layer.features() {
        let Some(geometry) = feature.geometry() else {
            warn!("Skipping feature {:?} without geometry", feature.fid());
            continue;
        };
        let has_z = type_has_z(geometry.geometry_type());
        let mut properties = Map::new();
        for (name, value) in feature.fields() {
            properties.insert(name, value.map(field_to_json).unwrap_or(Value::Null));
        }
        features.push(Feature {
            geometry: geometry_from_ogr(geometry)?,
            has_z,
            properties,
        });
    }
    debug!(
        "Read {} features from {} (EPSG: {:?})",
        features.len(),
        path.display(),
        epsg
    );
    Ok(VectorLayer { features, epsg })
}

impl VectorLayer {
    /// Geometry type names present in the layer, in order of appearance
    pub fn geometry_types(&self) -> Vec<&'static str> {
        let mut types = Vec::new();
        for feature in &self.features {
            let name = feature.geometry.type_name();
            if !types.contains(&name) {
                types.push(name);
            }
        }
        types
    }

    /// Reproject every feature to `epsg`; a layer already in that CRS is left untouched
    pub fn reproject(&mut self, epsg: u32) -> Result<()> {
        let source = self.epsg.ok_or_else(|| {
            Error::InvalidCrs("Geometry file has no CRS, cannot reproject it".into())
        })?;
        if source == epsg {
            return Ok(());
        }
        info!("Reprojecting geometries from EPSG:{} to EPSG:{}", source, epsg);
        let transform = traditional_transform(source, epsg)?;
        let transform_line = |line: &[Coord3]| -> Result<Vec<Coord3>> {
            let mut xs: Vec<f64> = line.iter().map(|c| c.x).collect();
            let mut ys: Vec<f64> = line.iter().map(|c| c.y).collect();
            let mut zs: Vec<f64> = line.iter().map(|c| c.z).collect();
            transform
                .transform_coords(&mut xs, &mut ys, &mut zs)
                .map_err(crate::io::GdalError::from)?;
            Ok((0..line.len())
                .map(|i| Coord3::new(xs[i], ys[i], line[i].z))
                .collect())
        };
        for feature in self.features.iter_mut() {
            feature.geometry = feature.geometry.map(
                &mut |c| Ok(transform_line(&[c])?[0]),
                &mut |line| transform_line(line),
            )?;
        }
        self.epsg = Some(epsg);
        Ok(())
    }
}

fn traditional_transform(source: u32, target: u32) -> Result<CoordTransform> {
    let mut src = SpatialRef::from_epsg(source).map_err(crate::io::GdalError::from)?;
    let mut dst = SpatialRef::from_epsg(target).map_err(crate::io::GdalError::from)?;
    // x = easting / longitude whatever the authority axis order
    src.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    dst.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(CoordTransform::new(&src, &dst).map_err(crate::io::GdalError::from)?)
}

/// GeoJSON feature collection, with a named CRS member when `epsg` is known
pub fn to_geojson(features: &[Feature], epsg: Option<u32>) -> Value {
    let mut collection = json!({
        "type": "FeatureCollection",
        "features": features
            .iter()
            .map(|f| json!({
                "type": "Feature",
                "properties": f.properties,
                "geometry": f.geometry.to_geojson(f.has_z),
            }))
            .collect::<Vec<_>>(),
    });
    if let Some(code) = epsg {
        collection["crs"] = json!({
            "type": "name",
            "properties": {"name": format!("urn:ogc:def:crs:EPSG::{}", code)},
        });
    }
    collection
}

pub fn write_geojson<P: AsRef<Path>>(path: P, features: &[Feature], epsg: Option<u32>) -> Result<()> {
    let text = serde_json::to_string_pretty(&to_geojson(features, epsg))?;
    std::fs::write(path.as_ref(), text)?;
    info!("Wrote {} features to {}", features.len(), path.as_ref().display());
    Ok(())
}
