//! Derived repository metrics.
//!
//! A pure, deterministic aggregation over a completed index: no I/O, never
//! fails, recomputed wholesale on every (re)index.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::models::{
    EntrypointReason, EntrypointRecord, GroupTotals, ImportRank, RepositoryIndex,
    RepositoryMetrics,
};

/// Conventional entry filenames, matched exactly (lowercase).
const ENTRY_FILENAMES: [&str; 10] = [
    "index.ts",
    "index.tsx",
    "index.js",
    "index.jsx",
    "main.ts",
    "main.tsx",
    "app.ts",
    "app.tsx",
    "server.ts",
    "server.js",
];

/// Canonical root-relative entry locations.
const ENTRY_LOCATIONS: [&str; 8] = [
    "app/page.tsx",
    "app/layout.tsx",
    "src/app/page.tsx",
    "src/app/layout.tsx",
    "pages/index.tsx",
    "pages/_app.tsx",
    "src/pages/index.tsx",
    "src/pages/_app.tsx",
];

/// How many files a folder needs before it appears in the output.
const FOLDER_FLOOR: u64 = 2;

const RANKING_CAP: usize = 10;

pub fn generate_metrics(index: &RepositoryIndex) -> RepositoryMetrics {
    let mut folders: BTreeMap<String, GroupTotals> = BTreeMap::new();
    let mut extensions: BTreeMap<String, GroupTotals> = BTreeMap::new();

    for file in &index.files {
        let folder = folder_of(&file.path);
        let totals = folders.entry(folder).or_default();
        totals.files += 1;
        totals.lines += file.lines;

        if let Some(i) = file.name.rfind('.') {
            if i > 0 {
                let ext = file.name[i..].to_lowercase();
                let totals = extensions.entry(ext).or_default();
                totals.files += 1;
                totals.lines += file.lines;
            }
        }
    }

    // Signal-to-noise floor: folders holding a single file say nothing
    // about structure.
    folders.retain(|_, totals| totals.files >= FOLDER_FLOOR);

    RepositoryMetrics {
        repository_id: index.id.clone(),
        generated_at: Utc::now(),
        folders,
        extensions,
        most_imported: rank_by(index, |f| f.relations.imported_by.len() as u64),
        most_importing: rank_by(index, |f| f.relations.imports.len() as u64),
        entrypoints: detect_entrypoints(index),
    }
}

/// Folder prefix of a path: forward slashes, trailing slash, `""` for root.
fn folder_of(path: &str) -> String {
    match path.rfind('/') {
        Some(i) => format!("{}/", &path[..i]),
        None => String::new(),
    }
}

/// Top files by edge count, descending, stable on ties, capped at 10.
fn rank_by(index: &RepositoryIndex, count: impl Fn(&crate::models::IndexedFile) -> u64) -> Vec<ImportRank> {
    let mut ranks: Vec<ImportRank> = index
        .files
        .iter()
        .map(|f| ImportRank {
            path: f.path.clone(),
            count: count(f),
        })
        .filter(|r| r.count > 0)
        .collect();
    ranks.sort_by(|a, b| b.count.cmp(&a.count));
    ranks.truncate(RANKING_CAP);
    ranks
}

/// Entrypoints by filename pattern or canonical location.
///
/// Filename match takes priority and wins the reason tag; a file matching
/// both conventions is recorded exactly once.
fn detect_entrypoints(index: &RepositoryIndex) -> Vec<EntrypointRecord> {
    let mut records: Vec<EntrypointRecord> = Vec::new();

    for file in &index.files {
        let lower_name = file.name.to_lowercase();
        if ENTRY_FILENAMES.contains(&lower_name.as_str()) {
            records.push(EntrypointRecord {
                path: file.path.clone(),
                reason: EntrypointReason::Filename,
            });
            continue;
        }
        if ENTRY_LOCATIONS.contains(&file.path.as_str()) {
            records.push(EntrypointRecord {
                path: file.path.clone(),
                reason: EntrypointReason::Location,
            });
        }
    }

    records
}
