//! Whole-file JSON persistence.
//!
//! Both game files are small and rewritten in full after every mutation.
//! Writes go to a sibling temporary file that is then renamed over the
//! target, so a crash mid-write leaves the previous version intact.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors that can arise while reading or writing a game file.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read and decode `path`.  A missing file is `Ok(None)`.
///
/// # Errors
///
/// [`StoreError::Io`] for unreadable files, [`StoreError::Json`] when the
/// content does not decode as `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
}

/// Encode `value` as pretty JSON and atomically replace `path` with it,
/// creating parent directories as needed.
///
/// # Errors
///
/// [`StoreError::Io`] when the directory, temporary file or rename fails.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = sibling(path, ".tmp");
    fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}

/// Move an unreadable file out of the way to `<path>.corrupt` and return the
/// new location.
///
/// # Errors
///
/// [`StoreError::Io`] when the rename fails.
pub fn quarantine(path: &Path) -> Result<PathBuf, StoreError> {
    let dest = sibling(path, ".corrupt");
    fs::rename(path, &dest).map_err(|e| StoreError::io(path, e))?;
    Ok(dest)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
