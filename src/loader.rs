//! # Definition directory loader.
//!
//! Reads every `*.json` file of a directory into raw unit definitions, ordered by
//! file name, ready for [`SupervisorHandle::register`](crate::SupervisorHandle::register).
//!
//! A missing or unreadable directory is an error. A file that cannot be read or
//! parsed is skipped with a warning so one bad definition does not hide the rest.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

/// Loads the raw definitions stored in `dir`.
pub async fn load_definitions(dir: impl AsRef<Path>) -> Result<Vec<Value>> {
    let dir = dir.as_ref();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("definition directory not found: {}", dir.display()))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("listing {}", dir.display()))?
    {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        match entry.file_type().await {
            Ok(kind) if kind.is_file() => paths.push(path),
            Ok(_) => {}
            Err(err) => warn!(file = %path.display(), error = %err, "definition skipped"),
        }
    }
    paths.sort();

    let mut definitions = Vec::with_capacity(paths.len());
    for path in paths {
        let parsed = tokio::fs::read(&path)
            .await
            .map_err(anyhow::Error::from)
            .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).map_err(Into::into));
        match parsed {
            Ok(value) => {
                debug!(file = %path.display(), "definition loaded");
                definitions.push(value);
            }
            Err(err) => warn!(file = %path.display(), error = %err, "definition skipped"),
        }
    }
    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loads_json_files_sorted_and_skips_bad_ones() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), r#"{"n": 2}"#).unwrap();
        std::fs::write(dir.path().join("a.json"), r#"{"n": 1}"#).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let defs = load_definitions(dir.path()).await.unwrap();
        assert_eq!(defs, vec![serde_json::json!({"n": 1}), serde_json::json!({"n": 2})]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_definitions(dir.path().join("nope")).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
