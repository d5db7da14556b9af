//! Replacement of the points of a cloud inside polygons by the points of
//! another cloud.
use std::path::Path;

use geo::{BoundingRect, Intersects};
use tracing::info;

use crate::api::las_info::writer_params_from_header;
use crate::core::expression::Expression;
use crate::error::Result;
use crate::io::las::read_point_cloud;
use crate::io::vector::read_vector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceCounts {
    /// Target points kept outside the areas
    pub target_kept: usize,
    /// Source points taken inside the areas
    pub source_added: usize,
}

struct Areas {
    shapes: Vec<(geo::Rect<f64>, geo::Geometry<f64>)>,
}

impl Areas {
    fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let layer = read_vector(path)?;
        let shapes = layer
            .features
            .iter()
            .map(|f| f.geometry.to_geo())
            .filter_map(|g| g.bounding_rect().map(|rect| (rect, g)))
            .collect();
        Ok(Self { shapes })
    }

    /// Edges count as inside
    fn contains(&self, x: f64, y: f64) -> bool {
        let point = geo::Point::new(x, y);
        self.shapes
            .iter()
            .any(|(rect, shape)| rect.intersects(&point) && shape.intersects(&point))
    }
}

/// Write the target points outside the areas of `replacement_area_file` (after
/// the optional `filter` expression) merged with the source points inside them.
/// The output has the dimensions and writer parameters of the target: source
/// dimensions unknown to the target are dropped, missing ones are zero.
pub fn replace_area<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>, S: AsRef<Path>>(
    target_cloud: P,
    source_cloud: Q,
    replacement_area_file: R,
    outfile: S,
    filter: Option<&str>,
) -> Result<ReplaceCounts> {
    let areas = Areas::read(&replacement_area_file)?;
    let mut target = read_point_cloud(&target_cloud)?;
    if let Some(source) = filter.filter(|f| !f.trim().is_empty()) {
        target = Expression::parse(source)?.filter(target)?;
    }
    target.points.retain(|p| !areas.contains(p.x, p.y));
    let target_kept = target.len();

    let mut source = read_point_cloud(&source_cloud)?;
    source.points.retain(|p| areas.contains(p.x, p.y));
    let source_added = source.len();
    for mut point in source.points {
        source.layout.remap(&target.layout, &mut point);
        target.points.push(point);
    }

    let params = writer_params_from_header(&target.header, None)?;
    target.write(&outfile, &params)?;
    info!(
        "Replaced area of {}: {} target points kept, {} source points added",
        target_cloud.as_ref().display(),
        target_kept,
        source_added
    );
    Ok(ReplaceCounts {
        target_kept,
        source_added,
    })
}
