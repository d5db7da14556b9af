//! Virtual points: 3D points or regularly sampled lines from a vector file,
//! appended to a LIDAR tile with a dedicated class.
use std::path::Path;

use las::Point;
use las::point::Classification;
use tracing::{debug, info};

use crate::api::las_info::{epsg_from_header, tile_bbox_from_header, writer_params_from_header};
use crate::core::geometry::{Coord3, Geometry3D, line_to_multipoint};
use crate::error::{Error, Result};
use crate::io::las::{parse_srs, read_point_cloud};
use crate::io::vector::{Feature, read_vector};
use crate::types::Bounds;

pub const VIRTUAL_POINTS_CLASS: u8 = 66;

#[derive(Debug, Clone)]
pub struct VirtualPointsParams {
    /// Classification of the added points
    pub virtual_points_class: u8,
    /// CRS of the tile, e.g. `EPSG:2154`; read from the LAS file when `None`
    pub spatial_ref: Option<String>,
    pub tile_width: f64,
    /// Distance between points generated along lines, in meters
    pub spacing: f64,
    /// Property holding the altitude, for 2D geometries
    pub altitude_column: Option<String>,
}

impl Default for VirtualPointsParams {
    fn default() -> Self {
        Self {
            virtual_points_class: VIRTUAL_POINTS_CLASS,
            spatial_ref: None,
            tile_width: 1000.0,
            spacing: 0.25,
            altitude_column: None,
        }
    }
}

/// One feature per part, with the properties of its parent
fn explode_features(features: Vec<Feature>) -> Vec<Feature> {
    features
        .into_iter()
        .flat_map(|feature| {
            let Feature {
                geometry,
                has_z,
                properties,
            } = feature;
            geometry.explode().into_iter().map(move |part| Feature {
                geometry: part,
                has_z,
                properties: properties.clone(),
            })
        })
        .collect()
}

/// Point features intersecting the tile
pub fn clip_3d_points_to_tile(points: Vec<Feature>, tile: &Bounds) -> Vec<Feature> {
    points
        .into_iter()
        .filter(|f| f.geometry.intersects_bounds(tile))
        .collect()
}

/// Line features intersecting the tile. Lines are kept whole.
pub fn clip_3d_lines_to_tile(lines: Vec<Feature>, tile: &Bounds) -> Vec<Feature> {
    lines
        .into_iter()
        .filter(|f| f.geometry.intersects_bounds(tile))
        .collect()
}

fn altitude_of(feature: &Feature, column: &str) -> Result<f64> {
    feature.number(column).ok_or_else(|| {
        Error::Geometry(format!(
            "altitude_column {} must exist in the geometry file if provided.",
            column
        ))
    })
}

/// Points every `spacing` along each line. Z comes from the geometries, or
/// from `altitude_column` for 2D lines.
pub fn generate_3d_points_from_lines(
    lines: &[Feature],
    spacing: f64,
    altitude_column: Option<&str>,
) -> Result<Vec<Coord3>> {
    if altitude_column.is_none() && !lines.is_empty() && !lines.iter().any(|f| f.has_z) {
        return Err(Error::Geometry(
            "Geometries do not have Z values and altitude_column is not provided.".into(),
        ));
    }
    let mut points = Vec::new();
    for feature in lines {
        let z_value = altitude_column
            .map(|column| altitude_of(feature, column))
            .transpose()?;
        for part in feature.geometry.clone().explode() {
            if let Geometry3D::LineString(line) = part {
                points.extend(line_to_multipoint(&line, spacing, feature.has_z, z_value)?);
            }
        }
    }
    Ok(points)
}

/// Points with Z from the geometries, or from `altitude_column`
fn points_with_z(features: &[Feature], altitude_column: Option<&str>) -> Result<Vec<Coord3>> {
    let mut points = Vec::new();
    for feature in features {
        let z_value = altitude_column
            .map(|column| altitude_of(feature, column))
            .transpose()?;
        for coord in feature.geometry.coords() {
            points.push(Coord3 {
                z: z_value.unwrap_or(coord.z),
                ..coord
            });
        }
    }
    Ok(points)
}

/// Append `points` to the input cloud with class `virtual_points_class`, every
/// other dimension zero. Without points, the input is copied as is.
/// Returns the number of points added.
pub fn add_points_to_las<P: AsRef<Path>, Q: AsRef<Path>>(
    points: &[Coord3],
    input_las: P,
    output_las: Q,
    crs: Option<&str>,
    virtual_points_class: u8,
) -> Result<usize> {
    let (input_las, output_las) = (input_las.as_ref(), output_las.as_ref());
    if points.is_empty() {
        info!(
            "No points to add. All points of the geometry file are outside the tile. \
             Copying the input file to output"
        );
        if input_las != output_las {
            std::fs::copy(input_las, output_las)?;
        }
        return Ok(0);
    }

    let mut cloud = read_point_cloud(input_las)?;
    let classification = Classification::new(virtual_points_class)?;
    let extra_len = cloud.layout.record_length() as usize;
    cloud.points.extend(points.iter().map(|c| Point {
        x: c.x,
        y: c.y,
        z: c.z,
        return_number: 0,
        number_of_returns: 0,
        classification,
        extra_bytes: vec![0; extra_len],
        ..Default::default()
    }));
    let params = writer_params_from_header(&cloud.header, crs)?;
    cloud.write(output_las, &params)?;
    info!(
        "Added {} virtual points of class {} to {}",
        points.len(),
        virtual_points_class,
        output_las.display()
    );
    Ok(points.len())
}

/// Add the points of a vector file (3D points, or points sampled along lines)
/// that fall in the tile of `input_las`. Returns the number of points added.
pub fn add_points_from_geometry_to_las<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
    input_geometry: P,
    input_las: Q,
    output_las: R,
    params: &VirtualPointsParams,
) -> Result<usize> {
    let input_las = input_las.as_ref();
    let epsg = match &params.spatial_ref {
        Some(srs) => parse_srs(srs)?,
        None => {
            let header = crate::io::las::read_header(input_las)?;
            epsg_from_header(&header).map_err(|_| {
                Error::MissingEpsg(format!(
                    "LAS file {} does not have a valid EPSG code.",
                    input_las.display()
                ))
            })?
        }
    };

    let mut layer = read_vector(&input_geometry)?;
    match layer.epsg {
        // geometries without CRS are assumed to be in the CRS of the tile
        None => layer.epsg = Some(epsg as u32),
        Some(_) => layer.reproject(epsg as u32)?,
    }

    let altitude_column = params.altitude_column.as_deref();
    if altitude_column.is_some() && layer.features.iter().any(|f| f.has_z) {
        return Err(Error::Geometry(
            "Both Z in geometries and altitude_column are provided. Please provide only one."
                .into(),
        ));
    }

    let tile = tile_bbox_from_header(input_las, params.tile_width)?;
    let types = layer.geometry_types();
    let points = match types.as_slice() {
        [] => Vec::new(),
        ["Point"] | ["MultiPoint"] => {
            let clipped = clip_3d_points_to_tile(explode_features(layer.features), &tile);
            points_with_z(&clipped, altitude_column)?
        }
        [kind @ ("LineString" | "MultiLineString")] => {
            if params.spacing <= 0.0 {
                return Err(Error::InvalidArgument {
                    arg: "spacing",
                    value: format!(
                        "{} (add_points_from_geometry_to_las requires spacing > 0 to run on \
                         (Multi)LineString geometries, geometry type: {})",
                        params.spacing, kind
                    ),
                });
            }
            let lines = clip_3d_lines_to_tile(layer.features, &tile);
            generate_3d_points_from_lines(&lines, params.spacing, altitude_column)?
                .into_iter()
                .filter(|c| tile.contains_xy(c.x, c.y))
                .collect()
        }
        [_] => {
            return Err(Error::Geometry(
                "Unsupported geometry type in the input Geometry file.".into(),
            ));
        }
        _ => {
            return Err(Error::Geometry(
                "Several geometry types found in geometry file. This case is not handled.".into(),
            ));
        }
    };
    debug!("{} virtual points in tile {}", points.len(), tile);

    add_points_to_las(
        &points,
        input_las,
        output_las,
        params.spatial_ref.as_deref(),
        params.virtual_points_class,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_random_laz::{RandomLazParams, create_random_laz};
    use crate::io::dimension::Dimension;
    use std::path::PathBuf;

    const CRS: &str = r#""crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::2154"}}"#;

    fn tile(dir: &Path) -> PathBuf {
        let path = dir.join("tile.laz");
        create_random_laz(
            &path,
            &RandomLazParams {
                point_format: 6,
                center: (770_500.0, 6_277_500.0),
                half_width: 400.0,
                seed: Some(11),
                ..Default::default()
            },
        )
        .unwrap();
        path
    }

    fn geojson(dir: &Path, features: &[&str]) -> PathBuf {
        let path = dir.join("geometry.geojson");
        let text = format!(
            r#"{{"type": "FeatureCollection", {}, "features": [{}]}}"#,
            CRS,
            features.join(",")
        );
        std::fs::write(&path, text).unwrap();
        path
    }

    fn point(x: f64, y: f64, z: f64) -> String {
        format!(
            r#"{{"type": "Feature", "properties": {{}}, "geometry": {{"type": "Point", "coordinates": [{}, {}, {}]}}}}"#,
            x, y, z
        )
    }

    fn multipoint(coords: &[(f64, f64, f64)]) -> String {
        let coords: Vec<String> = coords
            .iter()
            .map(|(x, y, z)| format!("[{}, {}, {}]", x, y, z))
            .collect();
        format!(
            r#"{{"type": "Feature", "properties": {{}}, "geometry": {{"type": "MultiPoint", "coordinates": [{}]}}}}"#,
            coords.join(",")
        )
    }

    fn line_2d(coords: &[(f64, f64)], altitude: f64) -> String {
        let coords: Vec<String> = coords.iter().map(|(x, y)| format!("[{}, {}]", x, y)).collect();
        format!(
            r#"{{"type": "Feature", "properties": {{"RecupZ": {}}}, "geometry": {{"type": "LineString", "coordinates": [{}]}}}}"#,
            altitude,
            coords.join(",")
        )
    }

    #[test]
    fn points_inside_the_tile_are_added() {
        let dir = tempfile::tempdir().unwrap();
        let input = tile(dir.path());
        let output = dir.path().join("out.laz");
        let geometry = geojson(
            dir.path(),
            &[
                &point(770_100.0, 6_277_100.0, 50.0),
                &point(770_900.0, 6_277_900.0, 60.0),
                &point(772_000.0, 6_277_500.0, 70.0),
            ],
        );
        let added = add_points_from_geometry_to_las(
            &geometry,
            &input,
            &output,
            &VirtualPointsParams::default(),
        )
        .unwrap();
        assert_eq!(added, 2);

        let cloud = read_point_cloud(&output).unwrap();
        assert_eq!(cloud.len(), 102);
        let classes = cloud.values(&Dimension::Classification);
        assert_eq!(classes.iter().filter(|c| **c == 66.0).count(), 2);
        let last = &cloud.points[101];
        assert!((last.x - 770_900.0).abs() < 0.01);
        assert!((last.z - 60.0).abs() < 0.01);
        assert_eq!(last.intensity, 0);
    }

    #[test]
    fn multipoints_keep_only_their_vertices_in_the_tile() {
        let dir = tempfile::tempdir().unwrap();
        let input = tile(dir.path());
        let output = dir.path().join("out.laz");
        let geometry = geojson(
            dir.path(),
            &[&multipoint(&[
                (770_500.0, 6_277_500.0, 10.0),
                (900_000.0, 6_277_500.0, 10.0),
            ])],
        );
        let added = add_points_from_geometry_to_las(
            &geometry,
            &input,
            &output,
            &VirtualPointsParams::default(),
        )
        .unwrap();
        assert_eq!(added, 1);

        let cloud = read_point_cloud(&output).unwrap();
        assert_eq!(cloud.len(), 101);
        let last = &cloud.points[100];
        assert!((last.x - 770_500.0).abs() < 0.01);
        assert!((last.z - 10.0).abs() < 0.01);
    }

    #[test]
    fn lines_are_sampled_with_the_altitude_column() {
        let dir = tempfile::tempdir().unwrap();
        let input = tile(dir.path());
        let output = dir.path().join("out.laz");
        let geometry = geojson(
            dir.path(),
            &[&line_2d(&[(770_100.0, 6_277_100.0), (770_110.0, 6_277_100.0)], 42.0)],
        );
        let params = VirtualPointsParams {
            spacing: 1.0,
            altitude_column: Some("RecupZ".into()),
            virtual_points_class: 67,
            ..Default::default()
        };
        let added = add_points_from_geometry_to_las(&geometry, &input, &output, &params).unwrap();
        assert_eq!(added, 11);
        let cloud = read_point_cloud(&output).unwrap();
        let virtual_points: Vec<_> = cloud.points[100..].iter().collect();
        assert!(virtual_points.iter().all(|p| (p.z - 42.0).abs() < 0.01));
        assert!(
            virtual_points
                .iter()
                .all(|p| u8::from(p.classification) == 67)
        );
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = tile(dir.path());
        let output = dir.path().join("out.laz");

        let geometry = geojson(dir.path(), &[&point(770_100.0, 6_277_100.0, 50.0)]);
        let params = VirtualPointsParams {
            altitude_column: Some("RecupZ".into()),
            ..Default::default()
        };
        let err = add_points_from_geometry_to_las(&geometry, &input, &output, &params).unwrap_err();
        assert!(err.to_string().contains("Both Z in geometries and altitude_column"));

        let geometry = geojson(
            dir.path(),
            &[
                &point(770_100.0, 6_277_100.0, 50.0),
                &line_2d(&[(770_100.0, 6_277_100.0), (770_110.0, 6_277_100.0)], 1.0),
            ],
        );
        let err = add_points_from_geometry_to_las(
            &geometry,
            &input,
            &output,
            &VirtualPointsParams::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Several geometry types"));

        let geometry = geojson(
            dir.path(),
            &[&line_2d(&[(770_100.0, 6_277_100.0), (770_110.0, 6_277_100.0)], 1.0)],
        );
        let params = VirtualPointsParams {
            spacing: 0.0,
            altitude_column: Some("RecupZ".into()),
            ..Default::default()
        };
        let err = add_points_from_geometry_to_las(&geometry, &input, &output, &params).unwrap_err();
        assert!(err.to_string().contains("requires spacing > 0"));

        let polygon = r#"{"type": "Feature", "properties": {}, "geometry": {"type": "Polygon", "coordinates": [[[770100, 6277100], [770200, 6277100], [770200, 6277200], [770100, 6277100]]]}}"#;
        let geometry = geojson(dir.path(), &[polygon]);
        let err = add_points_from_geometry_to_las(
            &geometry,
            &input,
            &output,
            &VirtualPointsParams::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unsupported geometry type"));
    }

    #[test]
    fn nothing_to_add_copies_the_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = tile(dir.path());
        let output = dir.path().join("out.laz");
        let added = add_points_to_las(&[], &input, &output, None, 66).unwrap();
        assert_eq!(added, 0);
        assert_eq!(std::fs::read(&input).unwrap(), std::fs::read(&output).unwrap());
    }

    #[test]
    fn lines_without_z_need_an_altitude() {
        let line = Feature::new(
            Geometry3D::LineString(vec![
                Coord3::new(0.0, 0.0, 0.0),
                Coord3::new(1.0, 0.0, 0.0),
            ]),
            false,
        );
        let err = generate_3d_points_from_lines(&[line], 0.5, None).unwrap_err();
        assert!(err.to_string().contains("do not have Z values"));
    }
}
