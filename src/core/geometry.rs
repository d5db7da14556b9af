//! 2.5D vector geometries and the line operations used to derive virtual points
//! and to rework geometry files (segmentation, snapping, Z from a raster).
use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{Coord, Intersects, Line};
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::types::Bounds;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coord3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coord3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn xy(&self) -> Coord<f64> {
        Coord {
            x: self.x,
            y: self.y,
        }
    }

    fn distance_2d(&self, other: &Coord3) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Geometries as read from a vector file. Polygons hold their exterior ring
/// first, then the interior rings; rings are closed.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry3D {
    Point(Coord3),
    MultiPoint(Vec<Coord3>),
    LineString(Vec<Coord3>),
    MultiLineString(Vec<Vec<Coord3>>),
    Polygon(Vec<Vec<Coord3>>),
    MultiPolygon(Vec<Vec<Vec<Coord3>>>),
    GeometryCollection(Vec<Geometry3D>),
}

impl Geometry3D {
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry3D::Point(_) => "Point",
            Geometry3D::MultiPoint(_) => "MultiPoint",
            Geometry3D::LineString(_) => "LineString",
            Geometry3D::MultiLineString(_) => "MultiLineString",
            Geometry3D::Polygon(_) => "Polygon",
            Geometry3D::MultiPolygon(_) => "MultiPolygon",
            Geometry3D::GeometryCollection(_) => "GeometryCollection",
        }
    }

    /// Every vertex, in storage order
    pub fn coords(&self) -> Vec<Coord3> {
        match self {
            Geometry3D::Point(c) => vec![*c],
            Geometry3D::MultiPoint(cs) | Geometry3D::LineString(cs) => cs.clone(),
            Geometry3D::MultiLineString(lines) | Geometry3D::Polygon(lines) => {
                lines.iter().flatten().copied().collect()
            }
            Geometry3D::MultiPolygon(polygons) => {
                polygons.iter().flatten().flatten().copied().collect()
            }
            Geometry3D::GeometryCollection(geoms) => {
                geoms.iter().flat_map(Geometry3D::coords).collect()
            }
        }
    }

    /// Split multi-part geometries and collections into single parts
    pub fn explode(self) -> Vec<Geometry3D> {
        match self {
            Geometry3D::MultiPoint(cs) => cs.into_iter().map(Geometry3D::Point).collect(),
            Geometry3D::MultiLineString(lines) => {
                lines.into_iter().map(Geometry3D::LineString).collect()
            }
            Geometry3D::MultiPolygon(polygons) => {
                polygons.into_iter().map(Geometry3D::Polygon).collect()
            }
            Geometry3D::GeometryCollection(geoms) => {
                geoms.into_iter().flat_map(Geometry3D::explode).collect()
            }
            single => vec![single],
        }
    }

    /// Planar counterpart, Z dropped
    pub fn to_geo(&self) -> geo::Geometry<f64> {
        let line = |cs: &Vec<Coord3>| geo::LineString::new(cs.iter().map(Coord3::xy).collect());
        let polygon = |rings: &Vec<Vec<Coord3>>| {
            let mut rings = rings.iter().map(line);
            let exterior = rings.next().unwrap_or_else(|| geo::LineString::new(vec![]));
            geo::Polygon::new(exterior, rings.collect())
        };
        match self {
            Geometry3D::Point(c) => geo::Geometry::Point(geo::Point::from(c.xy())),
            Geometry3D::MultiPoint(cs) => geo::Geometry::MultiPoint(geo::MultiPoint::new(
                cs.iter().map(|c| geo::Point::from(c.xy())).collect(),
            )),
            Geometry3D::LineString(cs) => geo::Geometry::LineString(line(cs)),
            Geometry3D::MultiLineString(lines) => geo::Geometry::MultiLineString(
                geo::MultiLineString::new(lines.iter().map(line).collect()),
            ),
            Geometry3D::Polygon(rings) => geo::Geometry::Polygon(polygon(rings)),
            Geometry3D::MultiPolygon(polygons) => geo::Geometry::MultiPolygon(
                geo::MultiPolygon::new(polygons.iter().map(polygon).collect()),
            ),
            Geometry3D::GeometryCollection(geoms) => geo::Geometry::GeometryCollection(
                geo::GeometryCollection(geoms.iter().map(Geometry3D::to_geo).collect()),
            ),
        }
    }

    pub fn intersects_bounds(&self, bounds: &Bounds) -> bool {
        self.to_geo().intersects(&bounds.to_rect())
    }

    /// Apply a point action and a line action to every part. Rings go through
    /// the line action and are closed again afterwards.
    pub fn map<P, L>(&self, on_point: &mut P, on_line: &mut L) -> Result<Geometry3D>
    where
        P: FnMut(Coord3) -> Result<Coord3>,
        L: FnMut(&[Coord3]) -> Result<Vec<Coord3>>,
    {
        let ring = |cs: &[Coord3], on_line: &mut L| -> Result<Vec<Coord3>> {
            let mut out = on_line(cs)?;
            if let (Some(first), Some(last)) = (out.first().copied(), out.last()) {
                if first.x != last.x || first.y != last.y {
                    out.push(first);
                }
            }
            Ok(out)
        };
        Ok(match self {
            Geometry3D::Point(c) => Geometry3D::Point(on_point(*c)?),
            Geometry3D::MultiPoint(cs) => Geometry3D::MultiPoint(
                cs.iter().map(|c| on_point(*c)).collect::<Result<_>>()?,
            ),
            Geometry3D::LineString(cs) => Geometry3D::LineString(on_line(cs)?),
            Geometry3D::MultiLineString(lines) => Geometry3D::MultiLineString(
                lines.iter().map(|l| on_line(l)).collect::<Result<_>>()?,
            ),
            Geometry3D::Polygon(rings) => Geometry3D::Polygon(
                rings
                    .iter()
                    .map(|r| ring(r, &mut *on_line))
                    .collect::<Result<_>>()?,
            ),
            Geometry3D::MultiPolygon(polygons) => {
                let mut out = Vec::with_capacity(polygons.len());
                for rings in polygons {
                    out.push(
                        rings
                            .iter()
                            .map(|r| ring(r, &mut *on_line))
                            .collect::<Result<_>>()?,
                    );
                }
                Geometry3D::MultiPolygon(out)
            }
            Geometry3D::GeometryCollection(geoms) => Geometry3D::GeometryCollection(
                geoms
                    .iter()
                    .map(|g| g.map(&mut *on_point, &mut *on_line))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    /// GeoJSON geometry object
    pub fn to_geojson(&self, has_z: bool) -> Value {
        let pos = |c: &Coord3| {
            if has_z {
                json!([c.x, c.y, c.z])
            } else {
                json!([c.x, c.y])
            }
        };
        let line = |cs: &Vec<Coord3>| Value::Array(cs.iter().map(pos).collect());
        let rings = |rs: &Vec<Vec<Coord3>>| Value::Array(rs.iter().map(line).collect());
        match self {
            Geometry3D::Point(c) => json!({"type": "Point", "coordinates": pos(c)}),
            Geometry3D::MultiPoint(cs) => json!({"type": "MultiPoint", "coordinates": line(cs)}),
            Geometry3D::LineString(cs) => json!({"type": "LineString", "coordinates": line(cs)}),
            Geometry3D::MultiLineString(ls) => {
                json!({"type": "MultiLineString", "coordinates": rings(ls)})
            }
            Geometry3D::Polygon(rs) => json!({"type": "Polygon", "coordinates": rings(rs)}),
            Geometry3D::MultiPolygon(ps) => json!({
                "type": "MultiPolygon",
                "coordinates": Value::Array(ps.iter().map(rings).collect()),
            }),
            Geometry3D::GeometryCollection(geoms) => json!({
                "type": "GeometryCollection",
                "geometries": geoms.iter().map(|g| g.to_geojson(has_z)).collect::<Vec<_>>(),
            }),
        }
    }
}

/// Planar length of a polyline
pub fn line_length(line: &[Coord3]) -> f64 {
    line.windows(2).map(|w| w[0].distance_2d(&w[1])).sum()
}

/// Point at a planar distance along a polyline, Z interpolated linearly.
/// Distances outside the line are clamped to its ends.
pub fn interpolate(line: &[Coord3], distance: f64) -> Option<Coord3> {
    let first = *line.first()?;
    if distance <= 0.0 {
        return Some(first);
    }
    let mut walked = 0.0;
    for w in line.windows(2) {
        let seg = w[0].distance_2d(&w[1]);
        if seg > 0.0 && walked + seg >= distance {
            let t = (distance - walked) / seg;
            return Some(Coord3::new(
                w[0].x + t * (w[1].x - w[0].x),
                w[0].y + t * (w[1].y - w[0].y),
                w[0].z + t * (w[1].z - w[0].z),
            ));
        }
        walked += seg;
    }
    line.last().copied()
}

/// Vertices every `step` along the line from its start, plus the last vertex
pub fn segmentize(line: &[Coord3], step: f64) -> Vec<Coord3> {
    if step <= 0.0 || line.len() < 2 {
        return line.to_vec();
    }
    let length = line_length(line);
    let mut out: Vec<Coord3> = (0..)
        .map(|i| i as f64 * step)
        .take_while(|d| *d < length)
        .filter_map(|d| interpolate(line, d))
        .collect();
    out.extend(line.last().copied());
    out
}

/// Regularly spaced points along a line. 3D lines keep their interpolated Z;
/// 2D lines take `z_value`.
pub fn line_to_multipoint(
    line: &[Coord3],
    spacing: f64,
    has_z: bool,
    z_value: Option<f64>,
) -> Result<Vec<Coord3>> {
    if spacing <= 0.0 {
        return Err(Error::InvalidArgument {
            arg: "spacing",
            value: spacing.to_string(),
        });
    }
    let z_value = if has_z {
        None
    } else {
        Some(z_value.ok_or_else(|| {
            Error::Geometry("z_value must be provided for 2D lines.".to_string())
        })?)
    };
    let length = line_length(line);
    let points = (0..)
        .map(|i| i as f64 * spacing)
        .take_while(|d| *d < length + spacing)
        .filter_map(|d| interpolate(line, d))
        .map(|c| Coord3 {
            z: z_value.unwrap_or(c.z),
            ..c
        })
        .collect();
    Ok(points)
}

fn segments(geometry: &Geometry3D) -> Vec<Line<f64>> {
    let of_line = |cs: &[Coord3]| {
        cs.windows(2)
            .map(|w| Line::new(w[0].xy(), w[1].xy()))
            .collect::<Vec<_>>()
    };
    match geometry {
        Geometry3D::Point(_) | Geometry3D::MultiPoint(_) => Vec::new(),
        Geometry3D::LineString(cs) => of_line(cs),
        Geometry3D::MultiLineString(lines) | Geometry3D::Polygon(lines) => {
            lines.iter().flat_map(|l| of_line(l)).collect()
        }
        Geometry3D::MultiPolygon(polygons) => polygons
            .iter()
            .flatten()
            .flat_map(|l| of_line(l))
            .collect(),
        Geometry3D::GeometryCollection(geoms) => geoms.iter().flat_map(segments).collect(),
    }
}

/// Insert the crossings with other geometries as new vertices of `line`,
/// ordered by distance along the line. New vertices get an interpolated Z.
pub fn add_vertices_at_intersections(line: &[Coord3], others: &[Geometry3D]) -> Vec<Coord3> {
    if line.len() < 2 {
        return line.to_vec();
    }
    let cutters: Vec<Line<f64>> = others.iter().flat_map(segments).collect();
    // (distance along the line, vertex)
    let mut vertices: Vec<(f64, Coord3)> = Vec::with_capacity(line.len());
    let mut walked = 0.0;
    for (i, w) in line.windows(2).enumerate() {
        if i == 0 {
            vertices.push((0.0, w[0]));
        }
        let segment = Line::new(w[0].xy(), w[1].xy());
        let seg_len = w[0].distance_2d(&w[1]);
        let mut crossings = Vec::new();
        for cutter in &cutters {
            match line_intersection(segment, *cutter) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    crossings.push(intersection)
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    crossings.push(intersection.start);
                    crossings.push(intersection.end);
                }
                None => {}
            }
        }
        for c in crossings {
            let along = (c.x - w[0].x).hypot(c.y - w[0].y);
            if along <= 1e-9 || along >= seg_len - 1e-9 {
                continue;
            }
            let t = along / seg_len;
            vertices.push((
                walked + along,
                Coord3::new(c.x, c.y, w[0].z + t * (w[1].z - w[0].z)),
            ));
        }
        walked += seg_len;
        vertices.push((walked, w[1]));
    }
    vertices.sort_by(|a, b| a.0.total_cmp(&b.0));
    vertices.dedup_by(|a, b| a.1 == b.1);
    vertices.into_iter().map(|(_, c)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(x: f64, y: f64, z: f64) -> Coord3 {
        Coord3::new(x, y, z)
    }

    #[test]
    fn segmentize_keeps_the_end() {
        let line = vec![c(0.0, 0.0, 0.0), c(1.0, 0.0, 4.0)];
        let out = segmentize(&line, 0.25);
        assert_eq!(out.len(), 5);
        assert_eq!(out[1], c(0.25, 0.0, 1.0));
        assert_eq!(out[4], c(1.0, 0.0, 4.0));

        let out = segmentize(&line, 0.3);
        let xs: Vec<f64> = out.iter().map(|p| (p.x * 10.0).round() / 10.0).collect();
        assert_eq!(xs, vec![0.0, 0.3, 0.6, 0.9, 1.0]);
    }

    #[test]
    fn multipoint_from_3d_and_2d_lines() {
        let line = vec![c(0.0, 0.0, 10.0), c(0.0, 1.0, 20.0)];
        let points = line_to_multipoint(&line, 0.25, true, None).unwrap();
        assert_eq!(points.len(), 5);
        assert_eq!(points[2].z, 15.0);

        let points = line_to_multipoint(&line, 0.3, false, Some(3.0)).unwrap();
        assert_eq!(points.len(), 5);
        assert_eq!(points[4], c(0.0, 1.0, 3.0));
        assert!(points.iter().all(|p| p.z == 3.0));

        let err = line_to_multipoint(&line, 0.3, false, None).unwrap_err();
        assert_eq!(err.to_string(), "z_value must be provided for 2D lines.");
    }

    #[test]
    fn vertices_added_at_crossings() {
        let line = vec![c(0.0, 0.0, 0.0), c(10.0, 0.0, 10.0)];
        let cutters = vec![
            Geometry3D::LineString(vec![c(7.0, -1.0, 0.0), c(7.0, 1.0, 0.0)]),
            Geometry3D::LineString(vec![c(2.0, -1.0, 0.0), c(2.0, 1.0, 0.0)]),
            Geometry3D::Point(c(5.0, 0.0, 0.0)),
        ];
        let out = add_vertices_at_intersections(&line, &cutters);
        let expected = [
            c(0.0, 0.0, 0.0),
            c(2.0, 0.0, 2.0),
            c(7.0, 0.0, 7.0),
            c(10.0, 0.0, 10.0),
        ];
        assert_eq!(out.len(), expected.len());
        for (got, want) in out.iter().zip(expected) {
            assert!(got.distance_2d(&want) < 1e-9);
            assert!((got.z - want.z).abs() < 1e-9);
        }
    }

    #[test]
    fn map_closes_rings() {
        let polygon = Geometry3D::Polygon(vec![vec![
            c(0.0, 0.0, 0.0),
            c(2.0, 0.0, 0.0),
            c(2.0, 2.0, 0.0),
            c(0.0, 0.0, 0.0),
        ]]);
        let out = polygon
            .map(&mut |p| Ok(p), &mut |l| Ok(segmentize(l, 1.0)))
            .unwrap();
        let Geometry3D::Polygon(rings) = out else {
            panic!("expected a polygon");
        };
        assert_eq!(rings[0].first(), rings[0].last());
        assert!(rings[0].len() > 4);
    }

    #[test]
    fn explode_and_bounds() {
        let geom = Geometry3D::GeometryCollection(vec![
            Geometry3D::MultiPoint(vec![c(0.0, 0.0, 1.0), c(50.0, 50.0, 1.0)]),
            Geometry3D::LineString(vec![c(-5.0, 5.0, 0.0), c(5.0, 5.0, 0.0)]),
        ]);
        assert_eq!(geom.coords().len(), 4);
        let parts = geom.explode();
        assert_eq!(parts.len(), 3);
        let bounds = Bounds::new(0.0, 10.0, 0.0, 10.0);
        let inside: Vec<bool> = parts.iter().map(|g| g.intersects_bounds(&bounds)).collect();
        assert_eq!(inside, vec![true, false, true]);
        assert_eq!(
            parts[0].to_geojson(true),
            json!({"type": "Point", "coordinates": [0.0, 0.0, 1.0]})
        );
    }
}
