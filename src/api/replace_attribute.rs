//! Value replacement on one attribute of a LAS file, e.g. class remapping.
use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info};

use crate::api::las_info::writer_params_from_header;
use crate::error::{Error, Result};
use crate::io::dimension::Dimension;
use crate::io::las::read_point_cloud;

/// `old value -> new value` pairs, at most one per old value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplacementMap {
    pairs: Vec<(f64, f64)>,
}

impl ReplacementMap {
    pub fn new_value(&self, old: f64) -> Option<f64> {
        self.pairs
            .iter()
            .find(|(from, _)| *from == old)
            .map(|(_, to)| *to)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Parse `{"new_value": [old_value, ...], ...}`
pub fn parse_replacement_map(json: &str) -> Result<ReplacementMap> {
    let raw: BTreeMap<String, Vec<f64>> = serde_json::from_str(json)?;
    let mut occurrences: Vec<(f64, usize)> = Vec::new();
    for old in raw.values().flatten() {
        match occurrences.iter_mut().find(|(v, _)| v == old) {
            Some((_, count)) => *count += 1,
            None => occurrences.push((*old, 1)),
        }
    }
    if let Some((val, count)) = occurrences.iter().find(|(_, count)| *count > 1) {
        return Err(Error::InvalidArgument {
            arg: "replacement map",
            value: format!("Duplicate value {} provided more than once (count={})", val, count),
        });
    }

    let mut pairs = Vec::new();
    for (new, olds) in &raw {
        let new: f64 = new.trim().parse().map_err(|_| Error::InvalidArgument {
            arg: "replacement map",
            value: new.clone(),
        })?;
        pairs.extend(olds.iter().map(|old| (*old, new)));
    }
    Ok(ReplacementMap { pairs })
}

pub fn read_replacement_map<P: AsRef<Path>>(path: P) -> Result<ReplacementMap> {
    parse_replacement_map(&std::fs::read_to_string(path)?)
}

/// Replace the values of `attribute` following `map`. Every point is looked up
/// with its original value, so replacements do not chain. Returns the number
/// of modified points.
pub fn replace_values<P: AsRef<Path>, Q: AsRef<Path>>(
    input_file: P,
    output_file: Q,
    map: &ReplacementMap,
    attribute: &str,
) -> Result<usize> {
    let mut cloud = read_point_cloud(&input_file)?;
    let dim = Dimension::parse(attribute);
    if !cloud.has_dimension(&dim) {
        return Err(Error::Dimension(format!(
            "Dimension {} not found in point cloud",
            attribute
        )));
    }
    let mut modified = 0;
    for point in cloud.points.iter_mut() {
        let Some(old) = dim.get(point, &cloud.layout) else {
            continue;
        };
        if let Some(new) = map.new_value(old) {
            dim.set(point, &cloud.layout, new)?;
            modified += 1;
        }
    }
    debug!("{} replacement rules on {}", map.len(), attribute);
    let params = writer_params_from_header(&cloud.header, None)?;
    cloud.write(&output_file, &params)?;
    info!(
        "Replaced {} values of {} in {}",
        modified,
        attribute,
        output_file.as_ref().display()
    );
    Ok(modified)
}
