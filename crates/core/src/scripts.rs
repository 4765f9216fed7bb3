use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::local_shell::ShellKind;
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script content must not be empty")]
    EmptyContent,
    #[error("script path must name a file")]
    MissingFileName,
    #[error("failed to write script to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// `path` with the shell's script extension appended unless it already ends
/// with it (case-insensitively).
#[must_use]
pub fn script_path(path: &Path, shell: ShellKind) -> PathBuf {
    let extension = shell.script_extension();
    let has_extension = path
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|current| current.eq_ignore_ascii_case(extension));
    if has_extension {
        return path.to_path_buf();
    }

    let mut file_name = path.as_os_str().to_owned();
    file_name.push(".");
    file_name.push(extension);
    PathBuf::from(file_name)
}

/// Writes `content` as a script for `shell` and bumps the matching counter.
/// Returns the path actually written.
pub fn save_script(
    store: &Store,
    shell: ShellKind,
    path: &Path,
    content: &str,
) -> Result<PathBuf, ScriptError> {
    if content.trim().is_empty() {
        return Err(ScriptError::EmptyContent);
    }
    if path.file_name().is_none() {
        return Err(ScriptError::MissingFileName);
    }

    let path = script_path(path, shell);
    fs::write(&path, content).map_err(|source| ScriptError::Write {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), %shell, "saved script");

    if let Some(counter) = shell.script_counter() {
        store.increment(counter)?;
    }
    Ok(path)
}
