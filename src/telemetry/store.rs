//! Writing harvested documents to disk.

use std::path::Path;

use serde_json::Value;

use crate::error::PersistError;

/// Persists JSON documents as pretty-printed files.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryWriter;

impl TelemetryWriter {
    pub fn new() -> Self {
        Self
    }

    /// Create `path` and any missing parents. Succeeds if it already exists.
    pub async fn ensure_dir(&self, path: &Path) -> Result<(), PersistError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|source| PersistError::CreateDir {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Write `doc` to `path` with two-space indentation, replacing any
    /// existing file.
    pub async fn write_json(&self, doc: &Value, path: &Path) -> Result<(), PersistError> {
        let bytes = serde_json::to_vec_pretty(doc).map_err(|source| PersistError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| PersistError::Write {
                path: path.to_path_buf(),
                source,
            })
    }
}
