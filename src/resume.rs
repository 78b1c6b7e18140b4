//! Compute the resume cursor from artifacts already on disk.

use std::path::Path;

use anyhow::{Context, Result};

/// Next unprocessed index for `output_dir`.
///
/// Creates the directory (and returns 0) when it does not exist. Otherwise
/// every entry contributes the index parsed from a leading `file_<digits>`
/// pattern, with non-matching names counting as 0, and the result is one
/// past the maximum. The scan runs once per process start.
pub fn next_index(output_dir: &Path) -> Result<usize> {
    if !output_dir.exists() {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;
        return Ok(0);
    }

    let entries = std::fs::read_dir(output_dir)
        .with_context(|| format!("Failed to read output directory {:?}", output_dir))?;

    let mut max_index: Option<usize> = None;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("Failed to list output directory {:?}", output_dir))?;
        let name = entry.file_name();
        let index = artifact_index(&name.to_string_lossy());
        max_index = Some(max_index.map_or(index, |m| m.max(index)));
    }

    Ok(max_index.map_or(0, |m| m + 1))
}

/// Index encoded in a `file_<digits>...` name, or 0 when the name does not
/// match.
fn artifact_index(name: &str) -> usize {
    let Some(rest) = name.strip_prefix("file_") else {
        return 0;
    };
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}
