//! Staging object storage.
//!
//! Layout of the local store: `{root}/{bucket}/{key}`. Keys may contain `/`
//! (e.g. `jobs/{job_id}/finnhub_data.json`), which become subdirectories.
//!
//! Writes are atomic (write to a `.tmp` sibling, rename into place), so a
//! concurrent reader sees either the previous object or the new one.

use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object gs://{bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    #[error("storage I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Put/get by name. Objects are overwritten on put; there is no versioning.
pub trait ObjectStore: Send + Sync {
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;
}

/// Filesystem-backed object store.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let safe = |s: &str| {
            !s.is_empty()
                && Path::new(s)
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)))
        };
        if !safe(bucket) || bucket.contains('/') {
            return Err(StorageError::InvalidKey(bucket.to_string()));
        }
        if !safe(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(bucket).join(key))
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, bytes).map_err(io_err(&tmp_path))?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StorageError::Io {
                path: path.clone(),
                source: e,
            }
        })?;

        tracing::debug!(bucket, key, bytes = bytes.len(), "uploaded object");
        Ok(())
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key)?;
        match fs::read(&path) {
            Ok(bytes) => {
                tracing::debug!(bucket, key, bytes = bytes.len(), "downloaded object");
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(StorageError::Io { path, source: e }),
        }
    }

    fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        Ok(self.object_path(bucket, key)?.is_file())
    }
}
