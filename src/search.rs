//! Plain indexed-file search.
//!
//! An order-preserving, case-insensitive substring filter — a pure existence
//! test, not a ranked search. This is also the pipeline's fallback when the
//! multi-signal retrieval stages select nothing.

use crate::models::IndexedFile;

/// Filter `files` to those matching `query`, preserving input order.
///
/// The predicate tries name, then path, then tags, then description, then
/// export names, short-circuiting on the first hit. An empty or blank query
/// (or empty corpus) yields an empty result; never an error.
pub fn search_files<'a>(files: &'a [IndexedFile], query: &str) -> Vec<&'a IndexedFile> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || files.is_empty() {
        return Vec::new();
    }

    files.iter().filter(|f| matches(f, &needle)).collect()
}

fn matches(file: &IndexedFile, needle: &str) -> bool {
    if file.name.to_lowercase().contains(needle) {
        return true;
    }
    if file.path.to_lowercase().contains(needle) {
        return true;
    }
    if file.tags.iter().any(|t| t.to_lowercase().contains(needle)) {
        return true;
    }
    if let Some(desc) = &file.description {
        if desc.to_lowercase().contains(needle) {
            return true;
        }
    }
    if let Some(exports) = &file.exports {
        if exports.iter().any(|e| e.to_lowercase().contains(needle)) {
            return true;
        }
    }
    false
}
