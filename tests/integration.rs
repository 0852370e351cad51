//! End-to-end indexing and question-answering tests against a mock
//! repository host and a scripted generation backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use repolens::analyzer::JsConventionAnalyzer;
use repolens::config::{Config, IndexerConfig};
use repolens::github::{Branch, FileContent, RepoHost, RepoTree, TreeEntry};
use repolens::indexer;
use repolens::llm::GenerationService;
use repolens::metrics;
use repolens::models::{FileCategory, RepoMetadata, RepositoryIndex};
use repolens::pipeline::{self, Confidence};
use repolens::question;
use repolens::sources;
use repolens::store::FsStore;

/// Repository host backed by in-memory fixtures. Counts content fetches so
/// tests can assert that bulk files never hit the network.
struct MockHost {
    tree: Vec<TreeEntry>,
    contents: HashMap<String, String>,
    metadata_fails: bool,
    content_fetches: AtomicUsize,
}

impl MockHost {
    fn new(tree: Vec<TreeEntry>, contents: HashMap<String, String>) -> Self {
        Self {
            tree,
            contents,
            metadata_fails: false,
            content_fetches: AtomicUsize::new(0),
        }
    }
}

fn blob(path: &str, size: u64) -> TreeEntry {
    serde_json::from_value(serde_json::json!({
        "path": path,
        "type": "blob",
        "sha": format!("sha-{}", path),
        "size": size,
    }))
    .unwrap()
}

fn tree_dir(path: &str) -> TreeEntry {
    serde_json::from_value(serde_json::json!({
        "path": path,
        "type": "tree",
        "sha": format!("sha-{}", path),
    }))
    .unwrap()
}

#[async_trait]
impl RepoHost for MockHost {
    async fn get_tree(&self, _: &str, _: &str, _: &str) -> Result<RepoTree> {
        Ok(RepoTree {
            tree: self.tree.clone(),
            truncated: false,
        })
    }

    async fn get_file_content(&self, _: &str, _: &str, path: &str, _: &str) -> Result<FileContent> {
        self.content_fetches.fetch_add(1, Ordering::SeqCst);
        match self.contents.get(path) {
            Some(content) => Ok(FileContent {
                content: content.clone(),
                sha: format!("sha-{}", path),
                size: content.len() as u64,
            }),
            None => bail!("404 for {}", path),
        }
    }

    async fn get_repo_metadata(&self, _: &str, _: &str) -> Result<RepoMetadata> {
        if self.metadata_fails {
            bail!("503 from metadata endpoint");
        }
        Ok(RepoMetadata {
            description: Some("A demo web app".to_string()),
            language: Some("TypeScript".to_string()),
            stars: 42,
            forks: 3,
            topics: vec!["demo".to_string()],
            default_branch: "main".to_string(),
        })
    }

    async fn get_last_commit(&self, _: &str, _: &str, _: &str) -> Result<String> {
        Ok("deadbeef".to_string())
    }

    async fn get_all_branches(&self, _: &str, _: &str) -> Result<Vec<Branch>> {
        Ok(vec![Branch {
            name: "main".to_string(),
            commit_sha: "deadbeef".to_string(),
            commit_date: None,
        }])
    }
}

fn sample_tree() -> Vec<TreeEntry> {
    vec![
        blob("README.md", 800),
        blob("package.json", 300),
        tree_dir("src"),
        tree_dir("src/components"),
        blob("src/components/Button.tsx", 400),
        blob("src/components/Input.tsx", 350),
        blob("src/services/login.ts", 500),
        blob("docs/guide.md", 1200),
    ]
}

fn sample_contents() -> HashMap<String, String> {
    let mut contents = HashMap::new();
    contents.insert(
        "README.md".to_string(),
        "# Demo\n\nA demo application.\n".to_string(),
    );
    contents.insert(
        "package.json".to_string(),
        r#"{"name": "demo", "dependencies": {"react": "^18.0.0", "next": "^14.0.0"}}"#.to_string(),
    );
    contents.insert(
        "docs/guide.md".to_string(),
        "# Guide\n\nHow to use the demo.\n".to_string(),
    );
    contents
}

async fn index_sample() -> (RepositoryIndex, Arc<MockHost>) {
    let host = Arc::new(MockHost::new(sample_tree(), sample_contents()));
    let analyzer = JsConventionAnalyzer::new();
    let config = IndexerConfig::default();

    let mut index = RepositoryIndex::shell("octocat", "demo", "main");
    indexer::run_index(
        Arc::clone(&host) as Arc<dyn RepoHost>,
        &analyzer,
        &config,
        &mut index,
    )
    .await
    .unwrap();
    (index, host)
}

#[tokio::test]
async fn indexes_whole_tree_with_key_files() {
    let (index, host) = index_sample().await;

    // Six blobs, directories excluded.
    assert_eq!(index.summary.total_files, 6);
    assert_eq!(index.files.len(), 6);

    assert_eq!(index.key_files.readme.as_deref(), Some("README.md"));
    assert_eq!(index.key_files.manifest.as_deref(), Some("package.json"));
    assert_eq!(index.key_files.docs, vec!["docs/guide.md".to_string()]);

    // Only key files cost a network round trip.
    assert_eq!(host.content_fetches.load(Ordering::SeqCst), 3);

    assert_eq!(index.metadata.stars, 42);
    assert_eq!(index.last_commit, "deadbeef");

    let manifest = index.files.iter().find(|f| f.path == "package.json").unwrap();
    assert!(manifest.is_key_file);
    let deps = manifest.dependencies.as_ref().unwrap();
    assert!(deps.contains(&"react".to_string()));
    assert!(deps.contains(&"next".to_string()));

    let guide = index.files.iter().find(|f| f.path == "docs/guide.md").unwrap();
    assert!(guide.is_documentation);

    let login = index.files.iter().find(|f| f.path == "src/services/login.ts").unwrap();
    assert_eq!(login.category, FileCategory::Service);
    // Metadata-only file: lines estimated from byte size.
    assert_eq!(login.lines, 500 / 40);
}

#[tokio::test]
async fn summary_groups_languages_and_categories() {
    let (index, _) = index_sample().await;

    assert_eq!(index.summary.languages.get(".tsx").unwrap().files, 2);
    assert_eq!(index.summary.languages.get(".md").unwrap().files, 2);
    assert_eq!(index.summary.languages.get(".ts").unwrap().files, 1);
    assert_eq!(index.summary.languages.get(".json").unwrap().files, 1);

    assert!(index.summary.categories.contains_key("component"));
    assert!(index.summary.categories.contains_key("service"));
}

#[tokio::test]
async fn hard_cap_aborts_before_any_content_fetch() {
    let tree: Vec<TreeEntry> = (0..4).map(|i| blob(&format!("src/f{}.ts", i), 100)).collect();
    let host = Arc::new(MockHost::new(tree, HashMap::new()));
    let analyzer = JsConventionAnalyzer::new();
    let config = IndexerConfig {
        max_files: 3,
        ..IndexerConfig::default()
    };

    let mut index = RepositoryIndex::shell("octocat", "demo", "main");
    let err = indexer::run_index(
        Arc::clone(&host) as Arc<dyn RepoHost>,
        &analyzer,
        &config,
        &mut index,
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("ceiling"));
    assert_eq!(host.content_fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn metadata_failure_aborts_run() {
    let mut host = MockHost::new(sample_tree(), sample_contents());
    host.metadata_fails = true;
    let host = Arc::new(host);
    let analyzer = JsConventionAnalyzer::new();

    let mut index = RepositoryIndex::shell("octocat", "demo", "main");
    let err = indexer::run_index(
        Arc::clone(&host) as Arc<dyn RepoHost>,
        &analyzer,
        &IndexerConfig::default(),
        &mut index,
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("metadata"));
    assert!(index.files.is_empty());
}

#[tokio::test]
async fn key_file_fetch_failure_degrades_to_metadata() {
    // README content is missing from the fixture, so its fetch 404s.
    let mut contents = sample_contents();
    contents.remove("README.md");
    let host = Arc::new(MockHost::new(sample_tree(), contents));
    let analyzer = JsConventionAnalyzer::new();

    let mut index = RepositoryIndex::shell("octocat", "demo", "main");
    indexer::run_index(
        Arc::clone(&host) as Arc<dyn RepoHost>,
        &analyzer,
        &IndexerConfig::default(),
        &mut index,
    )
    .await
    .unwrap();

    let readme = index.files.iter().find(|f| f.path == "README.md").unwrap();
    assert!(readme.is_key_file);
    // Estimated from the 800-byte tree entry.
    assert_eq!(readme.lines, 800 / 40);
}

#[tokio::test]
async fn metrics_cover_folders_and_entrypoints() {
    let (index, _) = index_sample().await;
    let report = metrics::generate_metrics(&index);

    assert_eq!(report.repository_id, index.id);
    // Folders with fewer than two files are dropped.
    let components = report.folders.get("src/components/").unwrap();
    assert_eq!(components.files, 2);
    assert!(!report.folders.contains_key("src/services/"));
    assert!(report.extensions.contains_key(".tsx"));
}

#[tokio::test]
async fn metrics_report_persists_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::minimal(dir.path().to_path_buf());
    let store = FsStore::new(&config.store);

    let (index, _) = index_sample().await;
    let report = metrics::generate_metrics(&index);
    store.save_metrics(&report).unwrap();

    let loaded = store.load_metrics(&index.storage_key()).unwrap();
    assert_eq!(loaded.repository_id, report.repository_id);
    assert_eq!(loaded.folders.len(), report.folders.len());
    assert_eq!(loaded.extensions.len(), report.extensions.len());
}

#[tokio::test]
async fn index_persists_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::minimal(dir.path().to_path_buf());
    let store = FsStore::new(&config.store);

    let (index, _) = index_sample().await;
    let key = index.storage_key();

    store.save_index(&index).unwrap();
    let loaded = store.load_index(&key).unwrap();
    assert_eq!(loaded.id, index.id);
    assert_eq!(loaded.summary.total_files, index.summary.total_files);
    assert_eq!(loaded.files.len(), index.files.len());
}

/// Generation backend that echoes a canned answer.
struct ScriptedLlm {
    reply: &'static str,
}

#[async_trait]
impl GenerationService for ScriptedLlm {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        assert!(system.contains("ONLY the context"));
        assert!(prompt.contains("Question:"));
        Ok(self.reply.to_string())
    }
}

#[tokio::test]
async fn ask_pipeline_uses_structured_sources_when_present() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::minimal(dir.path().to_path_buf());
    let store = FsStore::new(&config.store);

    let (index, _) = index_sample().await;
    let analysis_dir = store.analysis_dir(&index.storage_key());
    std::fs::create_dir_all(&analysis_dir).unwrap();
    std::fs::write(
        analysis_dir.join("flows.json"),
        r#"[{"name": "Login flow", "description": "credential validation steps"}]"#,
    )
    .unwrap();

    let analysis = question::analyze_question("how does the login flow work?", true);
    let selection =
        sources::select_json_sources(&analysis.signals, config.pipeline.max_json_sources);
    let json_context = sources::load_and_filter(&analysis_dir, &selection, &analysis);
    assert!(json_context.sufficient);

    let llm = ScriptedLlm {
        reply: "Login validates credentials against the service.",
    };
    let answer = pipeline::generate_answer(&index, &analysis, &json_context, &config.pipeline, &llm)
        .await
        .unwrap();

    // Structured context plus matching indexed files.
    assert_eq!(answer.confidence, Confidence::Medium);
    assert_eq!(answer.sources.json_sources, vec!["flows.json"]);
    assert!(answer
        .sources
        .files
        .contains(&"src/services/login.ts".to_string()));
}

#[tokio::test]
async fn ask_pipeline_falls_back_to_indexed_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::minimal(dir.path().to_path_buf());
    let store = FsStore::new(&config.store);

    let (index, _) = index_sample().await;
    let analysis_dir = store.analysis_dir(&index.storage_key());

    // No analysis artifacts exist, so every selected source fails to load.
    let analysis = question::analyze_question("how does the login flow work?", true);
    let selection =
        sources::select_json_sources(&analysis.signals, config.pipeline.max_json_sources);
    let json_context = sources::load_and_filter(&analysis_dir, &selection, &analysis);
    assert!(!json_context.sufficient);

    let llm = ScriptedLlm {
        reply: "Based on limited context, login lives in src/services/login.ts.",
    };
    let answer = pipeline::generate_answer(&index, &analysis, &json_context, &config.pipeline, &llm)
        .await
        .unwrap();

    assert_eq!(answer.confidence, Confidence::Low);
    assert!(answer
        .sources
        .files
        .contains(&"src/services/login.ts".to_string()));
    assert!(answer.notes.is_some());
}

#[tokio::test]
async fn spanish_question_reaches_the_same_sources() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::minimal(dir.path().to_path_buf());
    let store = FsStore::new(&config.store);

    let (index, _) = index_sample().await;
    let analysis_dir = store.analysis_dir(&index.storage_key());
    std::fs::create_dir_all(&analysis_dir).unwrap();
    std::fs::write(
        analysis_dir.join("flows.json"),
        r#"[{"name": "Login flow", "description": "pasos de validación de login"}]"#,
    )
    .unwrap();

    let analysis = question::analyze_question("¿Cómo funciona el flujo de login?", true);
    assert_eq!(analysis.normalized, "como funciona el flujo de login?");

    let selection =
        sources::select_json_sources(&analysis.signals, config.pipeline.max_json_sources);
    let json_context = sources::load_and_filter(&analysis_dir, &selection, &analysis);
    assert!(json_context.sufficient);
}
