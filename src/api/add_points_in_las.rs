//! Vertices of a geometry file appended to a LAS file as new points.
use std::path::Path;

use las::Point;
use tracing::info;

use crate::api::las_info::writer_params_from_header;
use crate::core::geometry::Coord3;
use crate::error::{Error, Result};
use crate::io::dimension::Dimension;
use crate::io::las::read_point_cloud;
use crate::io::vector::read_vector;

/// Every vertex of every geometry of a vector file. Polygon rings keep their
/// closing vertex; 2D geometries get a zero Z.
pub fn extract_points_from_geo<P: AsRef<Path>>(input_geo: P) -> Result<Vec<Coord3>> {
    let layer = read_vector(input_geo)?;
    Ok(layer
        .features
        .iter()
        .flat_map(|f| f.geometry.coords())
        .collect())
}

/// Parse a `KEY=VALUE` pair; the value is read as an integer, then as a float
pub fn parse_dimension_value(item: &str) -> Result<(Dimension, f64)> {
    let (key, value) = item.split_once('=').ok_or_else(|| Error::InvalidArgument {
        arg: "dimensions",
        value: item.to_string(),
    })?;
    let value = value.trim();
    let parsed = match value.parse::<i64>() {
        Ok(int) => int as f64,
        Err(_) => value.parse::<f64>().map_err(|_| Error::InvalidArgument {
            arg: "dimensions",
            value: item.to_string(),
        })?,
    };
    Ok((Dimension::parse(key.trim()), parsed))
}

pub fn parse_dimension_values<S: AsRef<str>>(items: &[S]) -> Result<Vec<(Dimension, f64)>> {
    items
        .iter()
        .map(|item| parse_dimension_value(item.as_ref()))
        .collect()
}

/// Append the vertices of `input_geo` to `input_las`. Added points carry the
/// given dimension values and zero elsewhere. Returns the number of points added.
pub fn add_points_in_las<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
    input_las: P,
    input_geo: Q,
    output_las: R,
    values: &[(Dimension, f64)],
) -> Result<usize> {
    let vertices = extract_points_from_geo(&input_geo)?;
    let mut cloud = read_point_cloud(&input_las)?;
    for (dim, _) in values {
        if !cloud.has_dimension(dim) {
            return Err(Error::Dimension(format!(
                "Dimension {} not found in {}",
                dim,
                input_las.as_ref().display()
            )));
        }
    }

    let extra_len = cloud.layout.record_length() as usize;
    for vertex in &vertices {
        let mut point = Point {
            x: vertex.x,
            y: vertex.y,
            z: vertex.z,
            extra_bytes: vec![0; extra_len],
            ..Default::default()
        };
        for (dim, value) in values {
            dim.set(&mut point, &cloud.layout, *value)?;
        }
        cloud.points.push(point);
    }

    let params = writer_params_from_header(&cloud.header, None)?;
    cloud.write(&output_las, &params)?;
    info!(
        "Added {} points from {} to {}",
        vertices.len(),
        input_geo.as_ref().display(),
        output_las.as_ref().display()
    );
    Ok(vertices.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_random_laz::{RandomLazParams, create_random_laz};

    const GEOMETRIES: &str = r#"{
"type": "FeatureCollection",
"crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::2154"}},
"features": [
{"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [650100.0, 6810100.0, 12.5]}},
{"type": "Feature", "properties": {}, "geometry": {"type": "Polygon", "coordinates": [[[650000.0, 6810000.0], [650010.0, 6810000.0], [650010.0, 6810010.0], [650000.0, 6810000.0]]]}}
]
}"#;

    #[test]
    fn dimension_values() {
        assert_eq!(
            parse_dimension_value("Classification=68").unwrap(),
            (Dimension::Classification, 68.0)
        );
        assert_eq!(
            parse_dimension_value(" height = 2.5").unwrap(),
            (Dimension::Extra("height".into()), 2.5)
        );
        assert!(parse_dimension_value("Classification").is_err());
        assert!(parse_dimension_value("Classification=ground").is_err());
    }

    #[test]
    fn vertices_are_appended_with_values() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.las");
        create_random_laz(
            &input,
            &RandomLazParams {
                point_format: 6,
                num_points: 20,
                extra_dims: vec![("height".into(), "float32".into())],
                ..Default::default()
            },
        )
        .unwrap();
        let geo = dir.path().join("points.geojson");
        std::fs::write(&geo, GEOMETRIES).unwrap();
        let output = dir.path().join("output.las");

        let values = parse_dimension_values(&["Classification=68", "height=2.5"]).unwrap();
        let added = add_points_in_las(&input, &geo, &output, &values).unwrap();
        // one point and the four vertices of the closed ring
        assert_eq!(added, 5);

        let cloud = read_point_cloud(&output).unwrap();
        assert_eq!(cloud.len(), 25);
        let first = &cloud.points[20];
        assert!((first.z - 12.5).abs() < 0.01);
        assert_eq!(u8::from(first.classification), 68);
        assert_eq!(cloud.points[21].z, 0.0);
        let heights = cloud.values(&Dimension::parse("height"));
        assert!(heights[20..].iter().all(|h| *h == 2.5));

        let missing = parse_dimension_values(&["unknown=1"]).unwrap();
        assert!(add_points_in_las(&input, &geo, &output, &missing).is_err());
    }
}
