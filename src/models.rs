//! Core data models for the repository index.
//!
//! These types represent the per-file metadata records, the aggregate
//! repository index, and the derived metrics artifact. The index and metrics
//! are persisted as JSON through the [`crate::store`] module, so every
//! persisted type here carries serde derives with camelCase field names to
//! match the on-disk artifact shape.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Coarse classification of a file's role in the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Component,
    Hook,
    Service,
    Config,
    Docs,
    Test,
    Utility,
    Style,
    Other,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Component => "component",
            FileCategory::Hook => "hook",
            FileCategory::Service => "service",
            FileCategory::Config => "config",
            FileCategory::Docs => "docs",
            FileCategory::Test => "test",
            FileCategory::Utility => "utility",
            FileCategory::Style => "style",
            FileCategory::Other => "other",
        }
    }
}

/// Fine-grained file kind, resolved by a strict priority cascade
/// (exact name > directory convention > extension fallback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    Readme,
    PackageManifest,
    Lockfile,
    TsConfig,
    FrameworkConfig,
    FirebaseConfig,
    EnvConfig,
    Component,
    Hook,
    Service,
    ApiRoute,
    Page,
    Layout,
    Middleware,
    Test,
    Stylesheet,
    Markdown,
    Json,
    TypeScript,
    JavaScript,
    Image,
    Other,
}

/// Derived process role of a file (see the analyzer's fixed decision order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessRole {
    Entrypoint,
    Orchestrator,
    Worker,
    Utility,
    Config,
    Unknown,
}

/// Process-role classification attached to every indexed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub role: ProcessRole,
    pub entrypoint: bool,
    /// Action verbs detected against the fixed vocabulary (filename + content).
    pub actions: Vec<String>,
    /// Literal API paths pulled out of fetch/axios-style call sites.
    pub calls_api: Vec<String>,
}

impl Default for ProcessInfo {
    fn default() -> Self {
        Self {
            role: ProcessRole::Unknown,
            entrypoint: false,
            actions: Vec::new(),
            calls_api: Vec::new(),
        }
    }
}

/// Resolved import-graph edges for one file.
///
/// Invariant (maintained by the resolver after a full indexing run): if
/// `a.imports` contains `b.path`, then `b.imported_by` contains `a.path`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRelations {
    pub imports: Vec<String>,
    pub imported_by: Vec<String>,
    /// Reserved; kept empty by the current analyses.
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub required_by: Vec<String>,
    #[serde(default)]
    pub related: Vec<String>,
}

/// One repository file's derived metadata record.
///
/// No raw content is retained after indexing. Optional summary fields mean
/// "unknown", never "confirmed absent" — extraction is best-effort.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedFile {
    /// Repository-root-relative path; unique key within the index.
    pub path: String,
    pub name: String,
    pub directory: String,

    pub size: u64,
    /// Content hash as reported by the hosting API.
    pub sha: String,
    /// Exact if content was fetched, otherwise estimated from byte size.
    pub lines: u64,

    pub category: FileCategory,
    pub kind: FileKind,
    pub tags: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exports: Option<Vec<String>>,
    /// Raw import specifiers as written in the source (capped at 10).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_specifiers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hooks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub props: Option<Vec<String>>,

    #[serde(default)]
    pub relations: FileRelations,

    pub is_key_file: bool,
    pub is_documentation: bool,

    #[serde(default)]
    pub process: ProcessInfo,
}

/// Index lifecycle status. `Indexing` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Indexing,
    Completed,
    Error,
}

/// Repository-level metadata from the hosting API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoMetadata {
    pub description: Option<String>,
    pub language: Option<String>,
    pub stars: u64,
    pub forks: u64,
    #[serde(default)]
    pub topics: Vec<String>,
    pub default_branch: String,
}

/// Pointers (by path) into `files` for the repository's key files.
///
/// Every path recorded here must exist in the index's file list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFiles {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    #[serde(default)]
    pub docs: Vec<String>,
}

/// Per-language file/line totals inside [`IndexSummary`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguageTotals {
    pub files: u64,
    pub lines: u64,
}

/// Aggregate counts computed at the end of an indexing run.
///
/// `total_files` always equals `files.len()` of the owning index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub total_files: u64,
    pub total_lines: u64,
    /// Keyed by lowercase file extension (including the leading dot).
    #[serde(default)]
    pub languages: BTreeMap<String, LanguageTotals>,
    /// Keyed by category name.
    #[serde(default)]
    pub categories: BTreeMap<String, u64>,
}

/// The aggregate root for one (owner, repo, branch) tuple.
///
/// Created as an empty `Indexing` shell, mutated in place by a single
/// indexer run, then persisted terminally as `Completed` or `Error` by the
/// caller. Readers never observe a partially written index (the store's
/// atomic-write contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndex {
    pub id: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub status: IndexStatus,
    pub last_commit: String,
    pub indexed_at: DateTime<Utc>,
    pub metadata: RepoMetadata,
    pub key_files: KeyFiles,
    pub files: Vec<IndexedFile>,
    pub summary: IndexSummary,
}

impl RepositoryIndex {
    /// Deterministic identity for an (owner, repo, branch) tuple.
    pub fn compose_id(owner: &str, repo: &str, branch: &str) -> String {
        format!("{}/{}@{}", owner, repo, branch)
    }

    /// Create the pre-run shell with `status = Indexing` and empty contents.
    pub fn shell(owner: &str, repo: &str, branch: &str) -> Self {
        Self {
            id: Self::compose_id(owner, repo, branch),
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
            status: IndexStatus::Indexing,
            last_commit: String::new(),
            indexed_at: Utc::now(),
            metadata: RepoMetadata::default(),
            key_files: KeyFiles::default(),
            files: Vec::new(),
            summary: IndexSummary::default(),
        }
    }

    /// Storage key for this index (see [`storage_key`]).
    pub fn storage_key(&self) -> String {
        storage_key(&self.id)
    }
}

/// Normalize an index id into a filesystem-safe storage key.
///
/// The sanitized id keeps the key readable; the sha256 suffix keeps it
/// uniquely derivable even when sanitization collapses distinct ids.
pub fn storage_key(id: &str) -> String {
    let sanitized: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = Sha256::digest(id.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}-{}", sanitized, &hex[..12])
}

// ============ Metrics ============

/// Why a file was recorded as an entrypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrypointReason {
    Filename,
    Location,
}

/// A detected entrypoint with its detection reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrypointRecord {
    pub path: String,
    pub reason: EntrypointReason,
}

/// File/line totals for one folder or extension group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupTotals {
    pub files: u64,
    pub lines: u64,
}

/// A file ranked by import-edge cardinality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRank {
    pub path: String,
    pub count: u64,
}

/// Derived, read-only aggregate computed from a completed index.
///
/// Recomputed wholesale on every (re)index; never updated incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryMetrics {
    pub repository_id: String,
    pub generated_at: DateTime<Utc>,
    /// Folder path (trailing slash, `""` for root) → totals.
    /// Folders with fewer than 2 files are excluded.
    pub folders: BTreeMap<String, GroupTotals>,
    /// Literal extension (leading dot) → totals.
    pub extensions: BTreeMap<String, GroupTotals>,
    /// Top 10 by `imported_by` cardinality, stable-sorted descending.
    pub most_imported: Vec<ImportRank>,
    /// Top 10 by `imports` cardinality, stable-sorted descending.
    pub most_importing: Vec<ImportRank>,
    pub entrypoints: Vec<EntrypointRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_id() {
        assert_eq!(
            RepositoryIndex::compose_id("acme", "shop", "main"),
            "acme/shop@main"
        );
    }

    #[test]
    fn test_storage_key_sanitizes() {
        let key = storage_key("acme/shop@feature/x");
        assert!(!key.contains('/'));
        assert!(!key.contains('@'));
        assert!(key.starts_with("acme_shop_feature_x-"));
    }

    #[test]
    fn test_storage_key_unique_for_colliding_ids() {
        // Sanitization alone would collapse these two.
        let a = storage_key("acme/shop@main");
        let b = storage_key("acme_shop@main");
        assert_ne!(a, b);
    }

    #[test]
    fn test_shell_is_indexing_and_empty() {
        let shell = RepositoryIndex::shell("acme", "shop", "main");
        assert_eq!(shell.status, IndexStatus::Indexing);
        assert!(shell.files.is_empty());
        assert_eq!(shell.summary.total_files, 0);
    }

    #[test]
    fn test_index_roundtrips_through_json() {
        let mut index = RepositoryIndex::shell("acme", "shop", "main");
        index.status = IndexStatus::Completed;
        let json = serde_json::to_string(&index).unwrap();
        assert!(json.contains("\"lastCommit\""));
        assert!(json.contains("\"keyFiles\""));
        let back: RepositoryIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, IndexStatus::Completed);
        assert_eq!(back.id, index.id);
    }
}
