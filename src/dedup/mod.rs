//! Duplicate detection index
//!
//! [`DedupIndex`] combines the hash index (content hash → canonical path) and
//! the URL index (resource URL → content hash) for one run. With
//! `keep_hashes`/`keep_hashes_db` enabled it is seeded from, and finalized
//! into, persisted [`HashStore`]s; otherwise it lives only in memory.
//!
//! Both indices are append-only: an entry, once present, is never replaced.

mod store;

pub use store::{HashFileStore, HashStore};

use crate::config::{Config, DedupConfig};
use crate::db::HashDatabase;
use crate::error::{PersistenceError, Result};
use crate::types::ContentHash;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// What to do with a resource whose content hash is already indexed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicateAction {
    /// Do not produce the file at all (`no_dupes`)
    Skip,
    /// Hardlink the canonical copy to the destination (`make_hard_links`)
    HardLink,
    /// Write an independent copy anyway
    Write,
}

/// Dedup decision for one fetched resource
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DedupDecision {
    /// First time this content is seen
    Unique,
    /// Content already indexed
    Duplicate {
        /// First-seen copy of the content
        canonical: PathBuf,
        /// Configured handling
        action: DuplicateAction,
    },
}

/// Hash and URL indices for a run
pub struct DedupIndex {
    hashes: HashMap<ContentHash, PathBuf>,
    urls: HashMap<String, Option<ContentHash>>,
    stores: Vec<Box<dyn HashStore>>,
    finalized: bool,
}

impl std::fmt::Debug for DedupIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupIndex")
            .field("hashes", &self.hashes.len())
            .field("urls", &self.urls.len())
            .field("stores", &self.stores.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl DedupIndex {
    /// Index that lives only for this run
    pub fn in_memory() -> Self {
        Self {
            hashes: HashMap::new(),
            urls: HashMap::new(),
            stores: Vec::new(),
            finalized: false,
        }
    }

    /// Index seeded from persisted stores
    ///
    /// When stores disagree about a hash, the first store loaded wins.
    pub async fn with_stores(
        stores: Vec<Box<dyn HashStore>>,
    ) -> std::result::Result<Self, PersistenceError> {
        let mut index = Self::in_memory();
        for store in &stores {
            let entries = store.load().await?;
            let count = entries.len();
            for (hash, path) in entries {
                index.hashes.entry(hash).or_insert(path);
            }
            info!(store = store.name(), entries = count, "Loaded hash store");
        }
        index.stores = stores;
        Ok(index)
    }

    /// Open the index described by the configuration
    ///
    /// `keep_hashes` adds a [`HashFileStore`] and `keep_hashes_db` a
    /// [`HashDatabase`]. With `search_existing`, files already in the download
    /// directory are hashed and indexed too.
    pub async fn open(config: &Config) -> Result<Self> {
        let mut stores: Vec<Box<dyn HashStore>> = Vec::new();
        if config.dedup.keep_hashes {
            stores.push(Box::new(HashFileStore::new(config.hash_dir())));
        }
        if config.dedup.keep_hashes_db {
            stores.push(Box::new(HashDatabase::new(&config.hash_db_path()).await?));
        }

        let mut index = if stores.is_empty() {
            Self::in_memory()
        } else {
            Self::with_stores(stores).await?
        };

        if config.dedup.search_existing {
            let download_dir = config.download_dir.clone();
            let skip = vec![config.hash_dir(), config.hash_db_path()];
            let found = tokio::task::spawn_blocking(move || scan_existing(&download_dir, &skip))
                .await
                .map_err(|e| crate::Error::Other(format!("existing file scan panicked: {}", e)))?;
            let count = found.len();
            for (hash, path) in found {
                index.hashes.entry(hash).or_insert(path);
            }
            info!(files = count, "Indexed existing downloads");
        }

        Ok(index)
    }

    /// Number of indexed hashes
    pub fn hash_count(&self) -> usize {
        self.hashes.len()
    }

    /// Canonical copy of a hash, if indexed
    pub fn canonical(&self, hash: &ContentHash) -> Option<&Path> {
        self.hashes.get(hash).map(PathBuf::as_path)
    }

    /// Hash recorded for a URL (`Some(None)` when seen but not yet hashed)
    pub fn url_hash(&self, url: &str) -> Option<Option<&ContentHash>> {
        self.urls.get(url).map(Option::as_ref)
    }

    /// Returns true if `url` was already handled this run; otherwise marks it as seen
    pub fn check_url_exists_or_add(&mut self, url: &str) -> bool {
        if self.urls.contains_key(url) {
            return true;
        }
        self.urls.insert(url.to_string(), None);
        false
    }

    /// Associate a URL with the hash of its content
    ///
    /// Fills in a URL seen without a hash; an existing hash is kept.
    pub fn record_url_hash(&mut self, url: &str, hash: &ContentHash) {
        let entry = self.urls.entry(url.to_string()).or_insert(None);
        if entry.is_none() {
            *entry = Some(hash.clone());
        }
    }

    /// Decide how to handle content with this hash
    ///
    /// | keep_hashes or keep_hashes_db | hash indexed? | decision |
    /// |---|---|---|
    /// | true  | yes (persisted or this run) | duplicate |
    /// | true  | no  | unique; recorded in memory and stores after write |
    /// | false | yes (this run only) | duplicate |
    /// | false | no  | unique; recorded in memory after write |
    ///
    /// A duplicate is skipped with `no_dupes`, else hardlinked with
    /// `make_hard_links`, else written again.
    pub fn decide(&self, hash: &ContentHash, config: &DedupConfig) -> DedupDecision {
        // In-memory mode never has stores, so this lookup only sees the current run
        let Some(canonical) = self.canonical(hash) else {
            return DedupDecision::Unique;
        };

        let action = if config.no_dupes {
            DuplicateAction::Skip
        } else if config.make_hard_links {
            DuplicateAction::HardLink
        } else {
            DuplicateAction::Write
        };
        debug!(%hash, canonical = %canonical.display(), ?action, persisted = config.persisted(), "Duplicate content");
        DedupDecision::Duplicate {
            canonical: canonical.to_path_buf(),
            action,
        }
    }

    /// Record that content with `hash` now exists at `path`
    ///
    /// Only the first path for a hash is kept. New entries are handed to
    /// every store's `record`; store failures are logged and do not fail the
    /// write that triggered them.
    pub async fn record_written(&mut self, hash: &ContentHash, path: &Path) -> bool {
        if self.hashes.contains_key(hash) {
            return false;
        }
        self.hashes.insert(hash.clone(), path.to_path_buf());
        for store in &self.stores {
            if let Err(e) = store.record(hash, path).await {
                warn!(store = store.name(), %hash, error = %e, "Failed to record hash entry");
            }
        }
        debug!(%hash, path = %path.display(), "Hash added to index");
        true
    }

    /// Persist the final index to every store, once
    ///
    /// Later calls are no-ops. Every store is attempted even if an earlier
    /// one fails; the first failure is returned.
    pub async fn finalize(&mut self) -> std::result::Result<(), PersistenceError> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;

        let snapshot: BTreeMap<ContentHash, PathBuf> = self
            .hashes
            .iter()
            .map(|(h, p)| (h.clone(), p.clone()))
            .collect();

        let mut first_error = None;
        for store in &self.stores {
            match store.save(&snapshot).await {
                Ok(()) => info!(store = store.name(), entries = snapshot.len(), "Saved hash store"),
                Err(e) => {
                    error!(store = store.name(), error = %e, "Failed to save hash store");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Hash every regular file under `dir`, skipping hidden files and anything under `skip`
fn scan_existing(dir: &Path, skip: &[PathBuf]) -> Vec<(ContentHash, PathBuf)> {
    let skip: Vec<String> = skip
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    let mut found = Vec::new();

    for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry during existing file scan");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let path_str = path.to_string_lossy();
        if hidden || skip.iter().any(|s| path_str.starts_with(s.as_str())) {
            continue;
        }
        match std::fs::read(path) {
            Ok(bytes) => found.push((ContentHash::of(&bytes), path.to_path_buf())),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to hash existing file"),
        }
    }
    found
}
