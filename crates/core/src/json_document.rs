use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

/// How a document came to be in memory after a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    /// The file did not exist; defaults were used.
    Created,
    /// The file could not be read or parsed; defaults replaced it.
    Reset { reason: String },
}

impl LoadStatus {
    #[must_use]
    pub fn needs_persist(&self) -> bool {
        !matches!(self, Self::Loaded)
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid document path `{0}`")]
    InvalidPath(PathBuf),
    #[error("failed to create config directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize document for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write document at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reads a JSON document, substituting `fallback()` when the file is missing,
/// empty, unreadable or malformed. Never fails.
pub fn load_or_default<T, F>(path: &Path, fallback: F) -> (T, LoadStatus)
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    if !path.exists() {
        return (fallback(), LoadStatus::Created);
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            return (
                fallback(),
                LoadStatus::Reset {
                    reason: format!("failed to read {}: {error}", path.display()),
                },
            );
        }
    };

    if raw.trim().is_empty() {
        return (
            fallback(),
            LoadStatus::Reset {
                reason: format!("{} is empty", path.display()),
            },
        );
    }

    match serde_json::from_str(&raw) {
        Ok(document) => (document, LoadStatus::Loaded),
        Err(error) => (
            fallback(),
            LoadStatus::Reset {
                reason: format!("failed to parse {}: {error}", path.display()),
            },
        ),
    }
}

/// Writes `document` as pretty JSON through a sibling temp file that is then
/// renamed over `path`, so a crash mid-write leaves the previous file intact.
pub fn write_atomic<T: Serialize>(path: &Path, document: &T) -> Result<(), DocumentError> {
    let parent_dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .ok_or_else(|| DocumentError::InvalidPath(path.to_path_buf()))?;
    fs::create_dir_all(parent_dir).map_err(|source| DocumentError::CreateDir {
        path: parent_dir.to_path_buf(),
        source,
    })?;

    let mut rendered =
        serde_json::to_string_pretty(document).map_err(|source| DocumentError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
    rendered.push('\n');

    let write_error = |source| DocumentError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut staged = NamedTempFile::new_in(parent_dir).map_err(write_error)?;
    staged.write_all(rendered.as_bytes()).map_err(write_error)?;
    staged.as_file().sync_all().map_err(write_error)?;
    staged
        .persist(path)
        .map_err(|error| write_error(error.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use tempfile::TempDir;

    use super::{load_or_default, write_atomic, LoadStatus};

    type Doc = BTreeMap<String, u32>;

    #[test]
    fn missing_file_reports_created_with_fallback() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("doc.json");

        let (doc, status): (Doc, _) = load_or_default(&path, Doc::new);
        assert!(doc.is_empty());
        assert_eq!(status, LoadStatus::Created);
        assert!(status.needs_persist());
    }

    #[test]
    fn malformed_file_reports_reset() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("doc.json");
        fs::write(&path, "{ not json").expect("failed to seed file");

        let (doc, status): (Doc, _) = load_or_default(&path, || Doc::from([("a".into(), 1)]));
        assert_eq!(doc.get("a"), Some(&1));
        assert!(matches!(status, LoadStatus::Reset { .. }));
    }

    #[test]
    fn write_then_load_round_trips_and_creates_parent_dirs() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("nested").join("doc.json");
        let doc = Doc::from([("x".into(), 7)]);

        write_atomic(&path, &doc).expect("write should succeed");
        let raw = fs::read_to_string(&path).expect("file should exist");
        assert!(raw.contains("\n  \"x\": 7"), "expected pretty JSON, got {raw}");

        let (loaded, status): (Doc, _) = load_or_default(&path, Doc::new);
        assert_eq!(loaded, doc);
        assert_eq!(status, LoadStatus::Loaded);

        let leftovers = fs::read_dir(path.parent().expect("parent"))
            .expect("dir should be readable")
            .count();
        assert_eq!(leftovers, 1, "temp file should have been renamed away");
    }
}
