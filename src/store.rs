//! Filesystem persistence for indexes, metrics, and per-repository locks.
//!
//! Everything lives under the configured data directory:
//!
//! ```text
//! <data_dir>/indexes/<storage-key>.json
//! <data_dir>/metrics/<storage-key>.json
//! <data_dir>/locks/<storage-key>.lock
//! <data_dir>/analysis/<storage-key>/*.json
//! ```
//!
//! Writes go through a temp file and rename so a crash never leaves a
//! half-written artifact behind.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::StoreConfig;
use crate::models::{RepositoryIndex, RepositoryMetrics};

pub struct FsStore {
    root: PathBuf,
    lock_ttl_secs: u64,
}

impl FsStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            root: config.data_dir.clone(),
            lock_ttl_secs: config.lock_ttl_secs,
        }
    }

    /// Directory holding the auxiliary JSON sources for one repository.
    pub fn analysis_dir(&self, storage_key: &str) -> PathBuf {
        self.root.join("analysis").join(storage_key)
    }

    fn index_path(&self, storage_key: &str) -> PathBuf {
        self.root.join("indexes").join(format!("{}.json", storage_key))
    }

    fn metrics_path(&self, storage_key: &str) -> PathBuf {
        self.root.join("metrics").join(format!("{}.json", storage_key))
    }

    fn lock_path(&self, storage_key: &str) -> PathBuf {
        self.root.join("locks").join(format!("{}.lock", storage_key))
    }

    pub fn save_index(&self, index: &RepositoryIndex) -> Result<()> {
        write_json(&self.index_path(&index.storage_key()), index)
    }

    pub fn load_index(&self, storage_key: &str) -> Result<RepositoryIndex> {
        read_json(&self.index_path(storage_key))
    }

    pub fn index_exists(&self, storage_key: &str) -> bool {
        self.index_path(storage_key).is_file()
    }

    pub fn delete_index(&self, storage_key: &str) -> Result<()> {
        let path = self.index_path(storage_key);
        if path.is_file() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to delete {}", path.display()))?;
        }
        Ok(())
    }

    pub fn save_metrics(&self, metrics: &RepositoryMetrics) -> Result<()> {
        let key = crate::models::storage_key(&metrics.repository_id);
        write_json(&self.metrics_path(&key), metrics)
    }

    pub fn load_metrics(&self, storage_key: &str) -> Result<RepositoryMetrics> {
        read_json(&self.metrics_path(storage_key))
    }

    /// List the storage keys of every persisted index.
    pub fn list_indexes(&self) -> Result<Vec<String>> {
        let dir = self.root.join("indexes");
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Acquire the per-repository indexing lock. Fails when a live lock is
    /// held by someone else; an expired lock is silently replaced.
    pub fn acquire_lock(&self, storage_key: &str) -> Result<()> {
        if self.is_locked(storage_key) {
            bail!("repository '{}' is already being indexed", storage_key);
        }
        let path = self.lock_path(storage_key);
        let expires = Utc::now() + Duration::seconds(self.lock_ttl_secs as i64);
        write_atomic(&path, expires.to_rfc3339().as_bytes())
    }

    pub fn release_lock(&self, storage_key: &str) -> Result<()> {
        let path = self.lock_path(storage_key);
        if path.is_file() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove lock {}", path.display()))?;
        }
        Ok(())
    }

    /// A lock file whose expiry timestamp is in the past, or whose content
    /// does not parse, counts as not locked.
    pub fn is_locked(&self, storage_key: &str) -> bool {
        let path = self.lock_path(storage_key);
        let Ok(content) = std::fs::read_to_string(&path) else {
            return false;
        };
        match DateTime::parse_from_rfc3339(content.trim()) {
            Ok(expires) => expires > Utc::now(),
            Err(_) => false,
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_vec_pretty(value).context("Failed to serialize artifact")?;
    write_atomic(path, &body)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("No parent directory for {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create {}", parent.display()))?;

    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", tmp.display()))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepositoryIndex;

    fn store_in(dir: &Path) -> FsStore {
        FsStore::new(&StoreConfig {
            data_dir: dir.to_path_buf(),
            lock_ttl_secs: 600,
        })
    }

    #[test]
    fn test_index_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let index = RepositoryIndex::shell("octocat", "hello-world", "main");
        let key = index.storage_key();

        assert!(!store.index_exists(&key));
        store.save_index(&index).unwrap();
        assert!(store.index_exists(&key));

        let loaded = store.load_index(&key).unwrap();
        assert_eq!(loaded.id, index.id);
        assert_eq!(loaded.branch, "main");
    }

    #[test]
    fn test_delete_index_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let index = RepositoryIndex::shell("octocat", "hello-world", "main");
        let key = index.storage_key();

        store.save_index(&index).unwrap();
        store.delete_index(&key).unwrap();
        assert!(!store.index_exists(&key));
        store.delete_index(&key).unwrap();
    }

    #[test]
    fn test_list_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.list_indexes().unwrap().is_empty());

        store
            .save_index(&RepositoryIndex::shell("octocat", "hello-world", "main"))
            .unwrap();
        assert_eq!(store.list_indexes().unwrap().len(), 1);
    }

    #[test]
    fn test_lock_blocks_until_released() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        store.acquire_lock("repo-key").unwrap();
        assert!(store.is_locked("repo-key"));
        assert!(store.acquire_lock("repo-key").is_err());

        store.release_lock("repo-key").unwrap();
        assert!(!store.is_locked("repo-key"));
        store.acquire_lock("repo-key").unwrap();
    }

    #[test]
    fn test_expired_lock_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(&StoreConfig {
            data_dir: dir.path().to_path_buf(),
            lock_ttl_secs: 0,
        });

        store.acquire_lock("repo-key").unwrap();
        assert!(!store.is_locked("repo-key"));
        store.acquire_lock("repo-key").unwrap();
    }

    #[test]
    fn test_garbage_lock_content_counts_as_unlocked() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let path = dir.path().join("locks").join("repo-key.lock");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not a timestamp").unwrap();
        assert!(!store.is_locked("repo-key"));
    }

    #[test]
    fn test_analysis_dir_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let analysis = store.analysis_dir("abc-123");
        assert!(analysis.ends_with("analysis/abc-123"));
    }
}
