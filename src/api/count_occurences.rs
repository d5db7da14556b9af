//! Number of points for each value of an attribute over a set of files.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::io::dimension::Dimension;
use crate::io::las::{has_las_extension, read_point_cloud};

/// Point counts keyed by the attribute value, written as an integer when it is one
pub type Counts = BTreeMap<String, u64>;

fn value_key(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Log the counts, one `Class k :: v` line per value
pub fn log_counts(counts: &Counts) {
    let mut text = vec!["Number of point per class:".to_string()];
    text.extend(counts.iter().map(|(k, v)| format!("Class {} :: {}", k, v)));
    info!("{}", text.join("\n"));
}

/// A single directory expands to the files of that directory accepted by `keep`
pub fn expand_inputs<F: Fn(&Path) -> bool>(inputs: &[PathBuf], keep: F) -> Result<Vec<PathBuf>> {
    match inputs {
        [dir] if dir.is_dir() => {
            let mut files = Vec::new();
            for entry in std::fs::read_dir(dir)? {
                let path = entry?.path();
                if path.is_file() && keep(&path) {
                    files.push(path);
                }
            }
            files.sort();
            info!(
                "Input is a directory. Run on {} files from {}",
                files.len(),
                dir.display()
            );
            Ok(files)
        }
        _ => Ok(inputs.to_vec()),
    }
}

pub fn compute_count_one_file<P: AsRef<Path>>(path: P, attribute: &str) -> Result<Counts> {
    let cloud = read_point_cloud(&path)?;
    let dim = Dimension::parse(attribute);
    if !cloud.has_dimension(&dim) {
        return Err(Error::Dimension(format!(
            "Dimension {} not found in point cloud",
            attribute
        )));
    }
    let mut counts = Counts::new();
    for value in cloud.values(&dim) {
        *counts.entry(value_key(value)).or_insert(0) += 1;
    }
    Ok(counts)
}

/// Sum of the counts of every file. A single directory input is replaced by
/// its LAS/LAZ files.
pub fn compute_count(inputs: &[PathBuf], attribute: &str) -> Result<Counts> {
    let files = expand_inputs(inputs, has_las_extension)?;
    let mut all_counts = Counts::new();
    for file in &files {
        debug!("Counting values of {} for {}", attribute, file.display());
        for (value, count) in compute_count_one_file(file, attribute)? {
            *all_counts.entry(value).or_insert(0) += count;
        }
    }
    log_counts(&all_counts);
    Ok(all_counts)
}
