//! Sum of count files produced by the count tool, e.g. after counting tiles
//! in parallel.
use std::path::{Path, PathBuf};

use tracing::info;

use crate::api::count_occurences::{Counts, expand_inputs, log_counts};
use crate::error::Result;

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Sum the counts of JSON files (or of the JSON files of a single directory);
/// written with an indentation of 2 when `output_file` is set
pub fn merge_counts(input_files: &[PathBuf], output_file: Option<&Path>) -> Result<Counts> {
    let files = expand_inputs(input_files, is_json)?;
    let mut all_counts = Counts::new();
    for file in &files {
        let counts: Counts = serde_json::from_str(&std::fs::read_to_string(file)?)?;
        for (value, count) in counts {
            *all_counts.entry(value).or_insert(0) += count;
        }
    }
    log_counts(&all_counts);

    if let Some(output) = output_file {
        std::fs::write(output, serde_json::to_string_pretty(&all_counts)?)?;
        info!("Counts of {} files written to {}", files.len(), output.display());
    }
    Ok(all_counts)
}
