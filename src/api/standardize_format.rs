//! Rewrite of LAS/LAZ files in the standard format (LAS 1.4, WKT CRS,
//! compressed, 1 cm precision), optionally dropping some classes.
use std::path::Path;

use tracing::info;

use crate::core::params::{WriterParams, get_writer_parameters};
use crate::error::Result;
use crate::io::dimension::Dimension;
use crate::io::las::read_point_cloud;

/// Writer parameters from a JSON preset file, merged over the standard ones
pub fn params_from_file<P: AsRef<Path>>(path: P) -> Result<WriterParams> {
    let text = std::fs::read_to_string(path)?;
    let overrides: serde_json::Value = serde_json::from_str(&text)?;
    get_writer_parameters(&overrides)
}

/// Rewrite `input_file` with `params`, without the points of `classes_to_remove`.
/// Returns the number of points written.
pub fn standardize<P: AsRef<Path>, Q: AsRef<Path>>(
    input_file: P,
    output_file: Q,
    params: &WriterParams,
    classes_to_remove: &[u8],
) -> Result<usize> {
    let mut cloud = read_point_cloud(&input_file)?;
    let total = cloud.len();
    if !classes_to_remove.is_empty() {
        let layout = &cloud.layout;
        cloud.points.retain(|p| {
            let class = Dimension::Classification.get(p, layout).unwrap_or(0.0) as u8;
            !classes_to_remove.contains(&class)
        });
        info!(
            "Removed {} points of classes {:?}",
            total - cloud.len(),
            classes_to_remove
        );
    }
    cloud.write(&output_file, params)?;
    info!(
        "Standardized {} to {} (format {}, {})",
        input_file.as_ref().display(),
        output_file.as_ref().display(),
        params.dataformat_id,
        params.a_srs.as_deref().unwrap_or("input CRS")
    );
    Ok(cloud.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_random_laz::{RandomLazParams, create_random_laz};
    use crate::core::params::ExtraDims;
    use crate::io::las::list_dims;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn class_counts(path: &Path) -> BTreeMap<u8, usize> {
        let cloud = read_point_cloud(path).unwrap();
        let mut counts = BTreeMap::new();
        for v in cloud.values(&Dimension::Classification) {
            *counts.entry(v as u8).or_insert(0) += 1;
        }
        counts
    }

    fn input(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("input.las");
        create_random_laz(
            &path,
            &RandomLazParams {
                num_points: 200,
                extra_dims: vec![
                    ("dtm_marker".into(), "float64".into()),
                    ("dsm_marker".into(), "float64".into()),
                ],
                seed: Some(3),
                ..Default::default()
            },
        )
        .unwrap();
        path
    }

    #[test]
    fn standard_format_drops_extra_dims() {
        let dir = tempfile::tempdir().unwrap();
        let input = input(dir.path());
        let output = dir.path().join("formatted.laz");
        standardize(&input, &output, &WriterParams::default(), &[]).unwrap();

        let cloud = read_point_cloud(&output).unwrap();
        let raw = cloud.header.clone().into_raw().unwrap();
        assert!(cloud.header.point_format().is_compressed);
        assert_eq!(cloud.header.version().minor, 4);
        assert_eq!(raw.global_encoding, 17);
        assert_eq!(cloud.header.point_format().to_u8().unwrap(), 6);
        assert!(cloud.layout.is_empty());
        assert_eq!(class_counts(&output), class_counts(&input));
    }

    #[test]
    fn selected_extra_dims_and_format_8() {
        let dir = tempfile::tempdir().unwrap();
        let input = input(dir.path());
        let output = dir.path().join("formatted.laz");
        let params = get_writer_parameters(&json!({
            "dataformat_id": 8,
            "extra_dims": ["dtm_marker=double"],
        }))
        .unwrap();
        standardize(&input, &output, &params, &[]).unwrap();
        let cloud = read_point_cloud(&output).unwrap();
        let dims = list_dims(&cloud);
        assert!(dims.contains(&"Infrared".to_string()));
        assert_eq!(cloud.layout.names(), vec!["dtm_marker"]);

        let params = WriterParams {
            extra_dims: ExtraDims::all(),
            ..Default::default()
        };
        standardize(&input, &output, &params, &[]).unwrap();
        let cloud = read_point_cloud(&output).unwrap();
        assert_eq!(cloud.layout.names(), vec!["dtm_marker", "dsm_marker"]);
    }

    #[test]
    fn classes_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let input = input(dir.path());
        let output = dir.path().join("formatted.laz");
        let written = standardize(&input, &output, &WriterParams::default(), &[2, 3]).unwrap();

        let mut expected = class_counts(&input);
        expected.remove(&2);
        expected.remove(&3);
        assert_eq!(class_counts(&output), expected);
        assert_eq!(written, expected.values().sum::<usize>());
    }

    #[test]
    fn preset_file_is_merged_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let preset = dir.path().join("preset.json");
        std::fs::write(&preset, r#"{"dataformat_id": 8, "a_srs": "EPSG:2975"}"#).unwrap();
        let params = params_from_file(&preset).unwrap();
        assert_eq!(params.dataformat_id, 8);
        assert_eq!(params.a_srs.as_deref(), Some("EPSG:2975"));
        assert_eq!(params.scale_x, 0.01);
    }
}
