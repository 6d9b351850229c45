//! File-backed assets partitioned by a batching regex.

use regex::Regex;
use std::path::{Path, PathBuf};

use super::value::{KeyValue, PartitionKey};
use crate::error::{Result, TermError};

/// Dimension holding a file's path relative to the base directory.
pub const PATH_DIMENSION: &str = "path";

/// Compiles a batching regex anchored to the whole relative path.
pub(crate) fn compile_batching_regex(pattern: &str) -> Result<Regex> {
    let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
        TermError::configuration(format!("invalid batching_regex '{pattern}': {e}"))
    })?;
    if regex.capture_names().flatten().any(|n| n == PATH_DIMENSION) {
        return Err(TermError::configuration(format!(
            "batching_regex cannot define a group named '{PATH_DIMENSION}'"
        )));
    }
    Ok(regex)
}

/// Named capture groups in order, followed by the path dimension.
pub(crate) fn dimension_names(regex: &Regex) -> Vec<String> {
    regex
        .capture_names()
        .flatten()
        .map(str::to_string)
        .chain(std::iter::once(PATH_DIMENSION.to_string()))
        .collect()
}

/// Lists files under `base_directory` matching `glob` and the regex.
///
/// Files that match the glob but not the regex are skipped. The result is
/// sorted by relative path.
pub(crate) fn enumerate_files(
    base_directory: &Path,
    glob: &str,
    regex: &Regex,
) -> Result<Vec<PartitionKey>> {
    let pattern = base_directory.join(glob);
    let pattern = pattern.to_str().ok_or_else(|| {
        TermError::configuration(format!(
            "base directory '{}' is not valid UTF-8",
            base_directory.display()
        ))
    })?;
    let entries = glob::glob(pattern).map_err(|e| {
        TermError::configuration(format!("invalid glob pattern '{pattern}': {e}"))
    })?;

    let mut keys = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| TermError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        if !path.is_file() {
            continue;
        }
        let Ok(relative) = path.strip_prefix(base_directory) else {
            continue;
        };
        let Some(relative) = relative.to_str() else {
            continue;
        };
        let relative = relative.replace('\\', "/");
        if let Some(key) = partition_for_path(regex, &relative) {
            keys.push(key);
        }
    }

    keys.sort_by(|a, b| a.get(PATH_DIMENSION).cmp(&b.get(PATH_DIMENSION)));
    Ok(keys)
}

/// [`enumerate_files`] on the blocking thread pool, for async callers.
pub(crate) async fn enumerate_files_blocking(
    base_directory: PathBuf,
    glob: String,
    regex: Regex,
) -> Result<Vec<PartitionKey>> {
    tokio::task::spawn_blocking(move || enumerate_files(&base_directory, &glob, &regex))
        .await
        .map_err(|e| TermError::Internal(format!("file enumeration task failed: {e}")))?
}

/// Derives the partition key of one relative path, if the regex matches.
pub(crate) fn partition_for_path(regex: &Regex, relative: &str) -> Option<PartitionKey> {
    let captures = regex.captures(relative)?;
    let mut key = PartitionKey::new();
    for name in regex.capture_names().flatten() {
        let value = match captures.name(name) {
            Some(m) => parse_group(m.as_str()),
            None => KeyValue::Null,
        };
        key.insert(name, value);
    }
    key.insert(PATH_DIMENSION, KeyValue::Text(relative.to_string()));
    Some(key)
}

fn parse_group(raw: &str) -> KeyValue {
    raw.parse::<i64>()
        .map(KeyValue::Integer)
        .unwrap_or_else(|_| KeyValue::Text(raw.to_string()))
}
