use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to access cache directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache file {path} is corrupt; delete it to refetch: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize cache entry {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Flat key to blob store, one JSON file per key under a single root.
///
/// There is no locking and no expiry: the last writer wins and a stale entry
/// is only cleared by removing its file. Running two instances against the
/// same root at once is unsupported.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| CacheError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(key, "cache miss");
                return Ok(None);
            }
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        let value = serde_json::from_slice(&bytes)
            .map_err(|source| CacheError::Corrupt { path, source })?;
        debug!(key, "cache hit");
        Ok(Some(value))
    }

    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value).map_err(|source| CacheError::Encode {
            key: key.to_string(),
            source,
        })?;

        // Staged beside the target; rename replaces it in one step.
        let path = self.path_for(key);
        let staging = self.root.join(format!("{key}.json.tmp"));
        fs::write(&staging, bytes).map_err(|source| CacheError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| CacheError::Io { path, source })?;
        debug!(key, "cache written");
        Ok(())
    }
}
