//! Rework of a geometry file: segmentation of lines, extra vertices where they
//! cross other geometries, and Z values read from a raster.
use std::path::Path;

use ndarray::Array2;
use tracing::{info, warn};

use crate::core::geometry::{Coord3, Geometry3D, add_vertices_at_intersections, segmentize};
use crate::error::{Error, Result};
use crate::io::gdal::RasterReader;
use crate::io::vector::{Feature, read_vector, write_geojson};

fn keep_point(c: Coord3) -> Result<Coord3> {
    Ok(c)
}

fn segmented(geometry: &Geometry3D, step: f64) -> Result<Geometry3D> {
    geometry.map(&mut keep_point, &mut |line| Ok(segmentize(line, step)))
}

fn snapped(geometry: &Geometry3D, others: &[Geometry3D]) -> Result<Geometry3D> {
    geometry.map(&mut keep_point, &mut |line| {
        Ok(add_vertices_at_intersections(line, others))
    })
}

fn vertex_z(raster: &RasterReader, band: &Array2<f64>, c: Coord3) -> Result<Coord3> {
    match raster.sample_bilinear(band, c.x, c.y) {
        Some(z) => Ok(Coord3::new(c.x, c.y, z)),
        None => {
            warn!("Vertex ({}, {}) is outside of the raster, Z kept at {}", c.x, c.y, c.z);
            Ok(c)
        }
    }
}

/// Z of every vertex interpolated from the first band
fn with_z_from_raster(geometry: &Geometry3D, raster: &RasterReader, band: &Array2<f64>) -> Result<Geometry3D> {
    geometry.map(&mut |c| vertex_z(raster, band, c), &mut |line| {
        line.iter().map(|c| vertex_z(raster, band, *c)).collect()
    })
}

fn is_geojson_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json") || e.eq_ignore_ascii_case("geojson"))
}

/// Apply, in order, segmentation every `segmentation` meters (when > 0), snapping
/// on the geometries of `input_geo_snap` and Z interpolation from
/// `interpol_raster`, then write the features as GeoJSON.
pub fn transform_geo<P: AsRef<Path>, Q: AsRef<Path>>(
    input_geo: P,
    output_geo: Q,
    interpol_raster: Option<&Path>,
    segmentation: f64,
    input_geo_snap: Option<&Path>,
) -> Result<usize> {
    let output_geo = output_geo.as_ref();
    if !is_geojson_path(output_geo) {
        return Err(Error::InvalidArgument {
            arg: "output_geo",
            value: format!("{} (expected a .json or .geojson file)", output_geo.display()),
        });
    }
    let layer = read_vector(&input_geo)?;
    let mut features: Vec<Feature> = layer.features;

    if segmentation > 0.0 {
        for feature in features.iter_mut() {
            feature.geometry = segmented(&feature.geometry, segmentation)?;
        }
    }

    if let Some(snap) = input_geo_snap {
        let others: Vec<Geometry3D> = read_vector(snap)?
            .features
            .into_iter()
            .map(|f| f.geometry)
            .collect();
        for feature in features.iter_mut() {
            feature.geometry = snapped(&feature.geometry, &others)?;
        }
    }

    if let Some(raster_path) = interpol_raster {
        let raster = RasterReader::open(raster_path)?;
        if let (Some(raster_epsg), Some(layer_epsg)) = (raster.metadata.epsg, layer.epsg) {
            if raster_epsg != layer_epsg {
                warn!(
                    "Raster CRS EPSG:{} differs from the geometries CRS EPSG:{}",
                    raster_epsg, layer_epsg
                );
            }
        }
        let band = raster.read_band(1)?;
        for feature in features.iter_mut() {
            feature.geometry = with_z_from_raster(&feature.geometry, &raster, &band)?;
            feature.has_z = true;
        }
    }

    write_geojson(output_geo, &features, layer.epsg)?;
    info!(
        "Transformed {} geometries of {}",
        features.len(),
        input_geo.as_ref().display()
    );
    Ok(features.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::writers::write_tiff_bands_u8;
    use serde_json::Value;

    const LINE: &str = r#"{
"type": "FeatureCollection",
"crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::2154"}},
"features": [
  {"type": "Feature", "properties": {"id": 1},
   "geometry": {"type": "LineString", "coordinates": [[700000, 6600000], [700010, 6600000]]}},
  {"type": "Feature", "properties": {"id": 2},
   "geometry": {"type": "Point", "coordinates": [700002.5, 6600002.5]}}
]}"#;

    const VERTICES: &str = r#"{
"type": "FeatureCollection",
"crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::2154"}},
"features": [
  {"type": "Feature", "properties": {"id": 1},
   "geometry": {"type": "Point", "coordinates": [700005, 6600000, 0]}},
  {"type": "Feature", "properties": {"id": 2},
   "geometry": {"type": "Point", "coordinates": [800000, 6600000, 5]}}
]}"#;

    const CROSSING: &str = r#"{
"type": "FeatureCollection",
"crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::2154"}},
"features": [
  {"type": "Feature", "properties": {},
   "geometry": {"type": "LineString", "coordinates": [[700003.3, 6599990], [700003.3, 6600010]]}}
]}"#;

    fn coordinates(output: &Path, index: usize) -> Vec<Value> {
        let json: Value = serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();
        match &json["features"][index]["geometry"]["coordinates"] {
            Value::Array(cs) => cs.clone(),
            other => vec![other.clone()],
        }
    }

    #[test]
    fn output_must_be_geojson() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("line.geojson");
        std::fs::write(&input, LINE).unwrap();
        let err = transform_geo(&input, dir.path().join("out.shp"), None, 1.0, None).unwrap_err();
        assert!(err.to_string().contains(".geojson"));
    }

    #[test]
    fn segmentation_and_snapping() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("line.geojson");
        let snap = dir.path().join("snap.geojson");
        std::fs::write(&input, LINE).unwrap();
        std::fs::write(&snap, CROSSING).unwrap();
        let output = dir.path().join("out.json");

        assert_eq!(transform_geo(&input, &output, None, 2.5, None).unwrap(), 2);
        let xs: Vec<f64> = coordinates(&output, 0)
            .iter()
            .map(|c| c[0].as_f64().unwrap())
            .collect();
        assert_eq!(xs, vec![700000.0, 700002.5, 700005.0, 700007.5, 700010.0]);

        transform_geo(&input, &output, None, 0.0, Some(&snap)).unwrap();
        let xs: Vec<f64> = coordinates(&output, 0)
            .iter()
            .map(|c| c[0].as_f64().unwrap())
            .collect();
        assert_eq!(xs.len(), 3);
        assert!((xs[1] - 700003.3).abs() < 1e-6);
    }

    fn two_level_raster(dir: &Path) -> std::path::PathBuf {
        let raster = dir.join("dtm.tif");
        let mut values = Array2::from_elem((20, 20), 10u8);
        // west half at 10, east half at 30
        values.slice_mut(ndarray::s![.., 10..]).fill(30);
        write_tiff_bands_u8(
            &raster,
            &[values],
            [699_995.0, 1.0, 0.0, 6_600_010.0, 0.0, -1.0],
            Some(2154),
        )
        .unwrap();
        raster
    }

    #[test]
    fn z_from_raster() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("line.geojson");
        std::fs::write(&input, LINE).unwrap();
        let raster = two_level_raster(dir.path());
        let output = dir.path().join("out.geojson");
        transform_geo(&input, &output, Some(&raster), 0.0, None).unwrap();

        let line = coordinates(&output, 0);
        assert_eq!(line[0][2].as_f64(), Some(10.0));
        assert_eq!(line[1][2].as_f64(), Some(30.0));
        let point = coordinates(&output, 1);
        assert_eq!(point[2].as_f64(), Some(10.0));
    }

    #[test]
    fn z_is_interpolated_between_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("vertices.geojson");
        std::fs::write(&input, VERTICES).unwrap();
        let raster = two_level_raster(dir.path());
        let output = dir.path().join("out.geojson");
        assert_eq!(transform_geo(&input, &output, Some(&raster), 0.0, None).unwrap(), 2);

        // halfway between the last 10 pixel and the first 30 pixel
        let between = coordinates(&output, 0);
        assert_eq!(between[2].as_f64(), Some(20.0));
        // outside of the raster: Z untouched
        let outside = coordinates(&output, 1);
        assert_eq!(outside[2].as_f64(), Some(5.0));
    }
}
