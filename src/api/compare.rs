//! Point by point comparison of two LAS files.
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use las::Point;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::io::dimension::Dimension;
use crate::io::las::{PointCloud, list_dims, read_point_cloud};

const SHOWN_DIFFERENCES: usize = 10;

fn log_differences(name: &str, diffs: &[(usize, f64, f64)]) {
    for (index, v1, v2) in diffs.iter().take(SHOWN_DIFFERENCES) {
        info!(
            "Point {}: file1={}, file2={}, diff={}",
            index,
            v1,
            v2,
            (v1 - v2).abs()
        );
    }
    if diffs.len() > SHOWN_DIFFERENCES {
        info!(
            "... and {} more differences on {}",
            diffs.len() - SHOWN_DIFFERENCES,
            name
        );
    }
}

/// True when both files have the same classification for every point index
pub fn compare_las_classification<P: AsRef<Path>, Q: AsRef<Path>>(file1: P, file2: Q) -> Result<bool> {
    let las1 = read_point_cloud(file1)?;
    let las2 = read_point_cloud(file2)?;
    if las1.len() != las2.len() {
        error!(
            "Files have different number of points: {} vs {}",
            las1.len(),
            las2.len()
        );
        return Ok(false);
    }
    let class1 = las1.values(&Dimension::Classification);
    let class2 = las2.values(&Dimension::Classification);
    let diffs: Vec<(usize, f64, f64)> = class1
        .iter()
        .zip(&class2)
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, (a, b))| (i, *a, *b))
        .collect();
    if diffs.is_empty() {
        info!("Classification is identical in both files");
        return Ok(true);
    }
    info!("Found {} points with different classification:", diffs.len());
    log_differences("Classification", &diffs);
    Ok(false)
}

/// Result of [`compare_las_dimensions`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimensionComparison {
    pub identical: bool,
    /// Points that differ on the first differing dimension
    pub n_diff: usize,
    /// `n_diff` as a percentage of the point count
    pub percent: f64,
}

impl DimensionComparison {
    fn different(n_diff: usize, total: usize) -> Self {
        Self {
            identical: false,
            n_diff,
            percent: if total == 0 {
                0.0
            } else {
                100.0 * n_diff as f64 / total as f64
            },
        }
    }

    fn same() -> Self {
        Self {
            identical: true,
            n_diff: 0,
            percent: 0.0,
        }
    }
}

/// Parse `DIM=VAL` tolerances
pub fn parse_precision<S: AsRef<str>>(items: &[S]) -> Result<HashMap<String, f64>> {
    items
        .iter()
        .map(|item| {
            let item = item.as_ref();
            item.split_once('=')
                .and_then(|(dim, value)| Some((dim.trim().to_string(), value.trim().parse().ok()?)))
                .ok_or_else(|| Error::InvalidArgument {
                    arg: "precision",
                    value: format!("{} (expected DIMENSION=PRECISION, e.g. X=0.001)", item),
                })
        })
        .collect()
}

fn sort_key(a: &Point, b: &Point) -> Ordering {
    let gps = |p: &Point| p.gps_time.unwrap_or(0.0);
    gps(a)
        .total_cmp(&gps(b))
        .then(a.x.total_cmp(&b.x))
        .then(a.y.total_cmp(&b.y))
        .then(a.z.total_cmp(&b.z))
}

fn sorted(mut cloud: PointCloud) -> PointCloud {
    cloud.points.sort_by(sort_key);
    cloud
}

/// Compare dimensions of two files after sorting their points by GPS time,
/// then X, Y and Z. Without `dimensions`, both files must have the same set of
/// dimensions and all of them are compared. Dimensions listed in `precision`
/// are compared with that absolute tolerance, the others exactly.
pub fn compare_las_dimensions<P: AsRef<Path>, Q: AsRef<Path>>(
    file1: P,
    file2: Q,
    dimensions: Option<&[String]>,
    precision: &HashMap<String, f64>,
) -> Result<DimensionComparison> {
    let las1 = read_point_cloud(file1)?;
    let las2 = read_point_cloud(file2)?;
    if las1.len() != las2.len() {
        info!(
            "Files have different number of points: {} vs {}",
            las1.len(),
            las2.len()
        );
        return Ok(DimensionComparison::different(0, 0));
    }
    let total = las1.len();

    let mut dims1 = list_dims(&las1);
    let mut dims2 = list_dims(&las2);
    dims1.sort();
    dims2.sort();
    let dimensions: Vec<String> = match dimensions {
        None => {
            if dims1 != dims2 {
                info!("Files have different dimensions");
                return Ok(DimensionComparison::different(0, 0));
            }
            dims1
        }
        Some(dims) => {
            for dim in dims {
                let dim = Dimension::parse(dim);
                if !las1.has_dimension(&dim) || !las2.has_dimension(&dim) {
                    info!(
                        "Dimension '{}' is not found in one or both files. Available dimensions: {}",
                        dim,
                        dims1.join(", ")
                    );
                    return Ok(DimensionComparison::different(0, 0));
                }
            }
            dims.to_vec()
        }
    };

    let las1 = sorted(las1);
    let las2 = sorted(las2);
    for name in &dimensions {
        let dim = Dimension::parse(name);
        let values1 = las1.values(&dim);
        let values2 = las2.values(&dim);
        let tolerance = precision.get(name).copied();
        let diffs: Vec<(usize, f64, f64)> = values1
            .iter()
            .zip(&values2)
            .enumerate()
            .filter(|(_, (a, b))| match tolerance {
                Some(tol) => (*a - *b).abs() > tol,
                None => a != b,
            })
            .map(|(i, (a, b))| (i, *a, *b))
            .collect();
        if !diffs.is_empty() {
            info!(
                "Found {} points with different {} (tolerance={:?}):",
                diffs.len(),
                name,
                tolerance
            );
            log_differences(name, &diffs);
            return Ok(DimensionComparison::different(diffs.len(), total));
        }
    }
    Ok(DimensionComparison::same())
}
