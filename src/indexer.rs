//! Indexing pipeline orchestration.
//!
//! Drives one full run over a pre-created index shell: metadata + tree fetch
//! (fatal on failure), key-file content fetch under a bounded concurrency
//! window, metadata-only bulk indexing in fixed-size batches, import-graph
//! resolution, and summary aggregation. The indexer mutates the shell in
//! place; locking and persistence belong to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::analyzer::{self, SourceAnalyzer};
use crate::config::IndexerConfig;
use crate::github::{RepoHost, TreeEntry};
use crate::graph;
use crate::models::{
    FileCategory, IndexSummary, IndexedFile, KeyFiles, LanguageTotals, RepositoryIndex,
};

/// Assumed bytes per line when content was not fetched.
const ESTIMATE_BYTES_PER_LINE: u64 = 40;

/// Run one full indexing pass, replacing the shell's files, key files,
/// metadata, and summary.
///
/// Fatal errors (tree/metadata fetch failure, file-count ceiling) propagate;
/// a failed content fetch for an individual key file degrades that one file
/// to metadata-only indexing and never aborts the run.
pub async fn run_index(
    host: Arc<dyn RepoHost>,
    analyzer: &dyn SourceAnalyzer,
    config: &IndexerConfig,
    index: &mut RepositoryIndex,
) -> Result<()> {
    let owner = index.owner.clone();
    let repo = index.repo.clone();
    let branch = index.branch.clone();

    let metadata = host
        .get_repo_metadata(&owner, &repo)
        .await
        .with_context(|| format!("Failed to fetch metadata for {}/{}", owner, repo))?;
    let last_commit = host
        .get_last_commit(&owner, &repo, &branch)
        .await
        .with_context(|| format!("Failed to fetch last commit for {}/{}@{}", owner, repo, branch))?;
    let tree = host
        .get_tree(&owner, &repo, &branch)
        .await
        .with_context(|| format!("Failed to fetch tree for {}/{}@{}", owner, repo, branch))?;

    let blobs: Vec<TreeEntry> = tree
        .tree
        .into_iter()
        .filter(|e| e.entry_type == "blob")
        .collect();

    // Ceiling check happens before any per-file content fetch.
    if blobs.len() > config.max_files {
        bail!(
            "Repository {}/{} has {} files, above the indexing ceiling of {}",
            owner,
            repo,
            blobs.len(),
            config.max_files
        );
    }

    let plan = plan_key_files(&blobs);
    let key_paths = plan.all_paths();

    // Key files need one network round trip each; keep a fixed window of
    // in-flight fetches so the hosting API is never hammered.
    let semaphore = Arc::new(Semaphore::new(config.key_file_concurrency));
    let mut fetches: JoinSet<(String, Option<String>)> = JoinSet::new();
    for path in &key_paths {
        let host = Arc::clone(&host);
        let semaphore = Arc::clone(&semaphore);
        let (owner, repo, branch, path) =
            (owner.clone(), repo.clone(), branch.clone(), path.clone());
        fetches.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            match host.get_file_content(&owner, &repo, &path, &branch).await {
                Ok(file) => (path, Some(file.content)),
                // Degrade this one file to metadata-only indexing.
                Err(_) => (path, None),
            }
        });
    }

    let mut contents: HashMap<String, Option<String>> = HashMap::new();
    while let Some(joined) = fetches.join_next().await {
        let (path, content) = joined.context("Key-file fetch task panicked")?;
        contents.insert(path, content);
    }

    let mut files: Vec<IndexedFile> = Vec::with_capacity(blobs.len());

    // Key files first, with whatever content survived.
    for entry in blobs.iter().filter(|e| key_paths.contains(&e.path)) {
        let content = contents.get(&entry.path).and_then(|c| c.as_deref());
        files.push(build_file(entry, content, analyzer, &plan));
    }

    // Everything else is metadata-only, in fixed-size batches.
    let remaining: Vec<&TreeEntry> = blobs
        .iter()
        .filter(|e| !key_paths.contains(&e.path))
        .collect();
    for batch in remaining.chunks(config.batch_size) {
        for entry in batch {
            files.push(build_file(entry, None, analyzer, &plan));
        }
    }

    graph::link_imports(&mut files);

    index.metadata = metadata;
    index.last_commit = last_commit;
    index.key_files = plan.into_key_files();
    index.summary = aggregate_summary(&files);
    index.files = files;
    index.indexed_at = Utc::now();

    Ok(())
}

/// Key-file selection for one tree, by fixed precedence.
#[derive(Debug, Default)]
pub struct KeyFilePlan {
    readme: Option<String>,
    manifest: Option<String>,
    config: Option<String>,
    docs: Vec<String>,
}

impl KeyFilePlan {
    fn all_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for p in [&self.readme, &self.manifest, &self.config] {
            if let Some(p) = p {
                if !paths.contains(p) {
                    paths.push(p.clone());
                }
            }
        }
        for p in &self.docs {
            if !paths.contains(p) {
                paths.push(p.clone());
            }
        }
        paths
    }

    fn into_key_files(self) -> KeyFiles {
        KeyFiles {
            readme: self.readme,
            manifest: self.manifest,
            config: self.config,
            docs: self.docs,
        }
    }

    fn is_doc(&self, path: &str) -> bool {
        self.docs.iter().any(|d| d == path)
    }
}

/// Pick the repository's key files.
///
/// Exact name matches (README, package manifest) win over prefix matches
/// (framework config, tsconfig, firebase config); shallower paths win over
/// deeper ones. Any markdown file under `docs/` joins the docs list.
pub fn plan_key_files(blobs: &[TreeEntry]) -> KeyFilePlan {
    let mut plan = KeyFilePlan::default();

    let mut readme_depth = usize::MAX;
    let mut manifest_depth = usize::MAX;
    let mut config_depth = usize::MAX;

    for entry in blobs {
        let name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
        let lower = name.to_lowercase();
        let depth = entry.path.matches('/').count();

        if (lower == "readme" || lower.starts_with("readme.")) && depth < readme_depth {
            plan.readme = Some(entry.path.clone());
            readme_depth = depth;
        } else if lower == "package.json" && depth < manifest_depth {
            plan.manifest = Some(entry.path.clone());
            manifest_depth = depth;
        } else if (lower.starts_with("next.config")
            || lower.starts_with("vite.config")
            || lower.starts_with("tsconfig")
            || lower.starts_with("firebase"))
            && depth < config_depth
        {
            plan.config = Some(entry.path.clone());
            config_depth = depth;
        }

        let lower_path = entry.path.to_lowercase();
        if (lower_path.starts_with("docs/") || lower_path.contains("/docs/"))
            && (lower.ends_with(".md") || lower.ends_with(".mdx"))
        {
            plan.docs.push(entry.path.clone());
        }
    }

    plan
}

fn build_file(
    entry: &TreeEntry,
    content: Option<&str>,
    analyzer: &dyn SourceAnalyzer,
    plan: &KeyFilePlan,
) -> IndexedFile {
    let name = entry
        .path
        .rsplit('/')
        .next()
        .unwrap_or(&entry.path)
        .to_string();
    let directory = match entry.path.rfind('/') {
        Some(i) => entry.path[..i].to_string(),
        None => String::new(),
    };

    let (kind, category) = analyzer::classify(&entry.path, &name);
    let tags = analyzer::extract_tags(&entry.path, &name, kind);

    let insights = content.map(|c| analyzer.analyze(c, &entry.path, kind));
    let lines = match &insights {
        Some(i) => i.lines,
        None => estimate_lines(entry.size),
    };

    let actions = analyzer.detect_actions(&name, content);
    let calls_api = insights
        .as_ref()
        .map(|i| i.calls_api.clone())
        .unwrap_or_default();
    let process = analyzer::classify_process(category, kind, &name, actions, calls_api);

    let is_key_file = plan.readme.as_deref() == Some(entry.path.as_str())
        || plan.manifest.as_deref() == Some(entry.path.as_str())
        || plan.config.as_deref() == Some(entry.path.as_str());
    let is_documentation = category == FileCategory::Docs || plan.is_doc(&entry.path);

    let insights = insights.unwrap_or_default();
    IndexedFile {
        path: entry.path.clone(),
        name,
        directory,
        size: entry.size,
        sha: entry.sha.clone(),
        lines,
        category,
        kind,
        tags,
        description: insights.description,
        exports: insights.exports,
        import_specifiers: insights.imports,
        dependencies: insights.dependencies,
        functions: insights.functions,
        hooks: insights.hooks,
        props: None,
        relations: Default::default(),
        is_key_file,
        is_documentation,
        process,
    }
}

fn estimate_lines(size: u64) -> u64 {
    (size / ESTIMATE_BYTES_PER_LINE).max(1)
}

fn aggregate_summary(files: &[IndexedFile]) -> IndexSummary {
    let mut summary = IndexSummary {
        total_files: files.len() as u64,
        ..IndexSummary::default()
    };

    for file in files {
        summary.total_lines += file.lines;

        let ext = match file.name.rfind('.') {
            Some(i) if i > 0 => file.name[i..].to_lowercase(),
            _ => "(none)".to_string(),
        };
        let lang = summary.languages.entry(ext).or_insert_with(LanguageTotals::default);
        lang.files += 1;
        lang.lines += file.lines;

        *summary
            .categories
            .entry(file.category.as_str().to_string())
            .or_insert(0) += 1;
    }

    summary
}
