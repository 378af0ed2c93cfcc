//! Persisted hash stores

use crate::error::PersistenceError;
use crate::types::ContentHash;
use crate::writer::write_atomic;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Backing store for the content-hash index
///
/// Stores are loaded once when the index opens and saved once when it is
/// finalized. `record` is called for every new entry in between, for stores
/// that persist entry by entry.
#[async_trait]
pub trait HashStore: Send + Sync {
    /// Human-readable store name for logging
    fn name(&self) -> &str;

    /// Read every persisted entry
    async fn load(&self) -> Result<Vec<(ContentHash, PathBuf)>, PersistenceError>;

    /// Persist a single new entry
    async fn record(&self, _hash: &ContentHash, _path: &Path) -> Result<(), PersistenceError> {
        Ok(())
    }

    /// Persist the full index, replacing what the store held before
    async fn save(&self, entries: &BTreeMap<ContentHash, PathBuf>)
    -> Result<(), PersistenceError>;
}

/// One record file per hash
///
/// Each entry is a file named by the hex digest whose content is the path of
/// the canonical copy. Files are written atomically, so a crash leaves every
/// record either complete or absent.
#[derive(Clone, Debug)]
pub struct HashFileStore {
    dir: PathBuf,
}

impl HashFileStore {
    /// Use `dir` as the record directory (created on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Record directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, hash: &ContentHash) -> PathBuf {
        self.dir.join(hash.as_str())
    }

    fn write_record(&self, hash: &ContentHash, path: &Path) -> Result<(), PersistenceError> {
        let content = path.to_string_lossy();
        write_atomic(content.as_bytes(), &self.record_path(hash), None)?;
        Ok(())
    }
}

fn is_hex_digest(name: &str) -> bool {
    name.len() == 64 && name.chars().all(|c| c.is_ascii_hexdigit())
}

#[async_trait]
impl HashStore for HashFileStore {
    fn name(&self) -> &str {
        "hash files"
    }

    async fn load(&self) -> Result<Vec<(ContentHash, PathBuf)>, PersistenceError> {
        let mut entries = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let io_err = |source| PersistenceError::Io {
            path: self.dir.clone(),
            source,
        };
        while let Some(entry) = dir.next_entry().await.map_err(io_err)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_hex_digest(&name) {
                continue;
            }
            let content = tokio::fs::read_to_string(entry.path())
                .await
                .map_err(|source| PersistenceError::Io {
                    path: entry.path(),
                    source,
                })?;
            let path = content.trim();
            if path.is_empty() {
                tracing::warn!(record = %entry.path().display(), "Ignoring empty hash record");
                continue;
            }
            entries.push((ContentHash(name.to_lowercase()), PathBuf::from(path)));
        }
        Ok(entries)
    }

    async fn record(&self, hash: &ContentHash, path: &Path) -> Result<(), PersistenceError> {
        self.write_record(hash, path)
    }

    async fn save(
        &self,
        entries: &BTreeMap<ContentHash, PathBuf>,
    ) -> Result<(), PersistenceError> {
        // Entries recorded during the run are already on disk
        for (hash, path) in entries {
            if !self.record_path(hash).exists() {
                self.write_record(hash, path)?;
            }
        }
        Ok(())
    }
}
