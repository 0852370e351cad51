//! # RepoLens CLI (`repolens`)
//!
//! The `repolens` binary indexes GitHub-hosted repositories and answers
//! questions about them through a local LLM.
//!
//! ## Usage
//!
//! ```bash
//! repolens --config ./config/repolens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `repolens index <owner/repo>` | Fetch, analyze, and persist a repository index |
//! | `repolens branches <owner/repo>` | List the repository's branches |
//! | `repolens list` | List locally indexed repositories |
//! | `repolens metrics <owner/repo>` | Folder, import, and entrypoint statistics |
//! | `repolens search <owner/repo> "<query>"` | Literal search over indexed files |
//! | `repolens ask <owner/repo> "<question>"` | Answer a question about the repository |
//!
//! ## Examples
//!
//! ```bash
//! # Index the default branch
//! repolens index octocat/hello-world
//!
//! # Re-index a specific branch from scratch
//! repolens index octocat/hello-world --branch develop --force
//!
//! # Ask in English or Spanish
//! repolens ask octocat/hello-world "how does the login flow work?"
//! repolens ask octocat/hello-world "¿cómo funciona el flujo de login?"
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use repolens::analyzer::JsConventionAnalyzer;
use repolens::config::{self, Config};
use repolens::github::{GitHubClient, RepoHost};
use repolens::indexer;
use repolens::metrics;
use repolens::models::{IndexStatus, RepositoryIndex};
use repolens::pipeline;
use repolens::question;
use repolens::search;
use repolens::sources;
use repolens::store::FsStore;
use repolens::{llm, models};

/// RepoLens CLI — repository indexing and question answering over the
/// GitHub API and a local LLM.
#[derive(Parser)]
#[command(
    name = "repolens",
    about = "RepoLens — index GitHub repositories and ask questions about them",
    version,
    long_about = "RepoLens builds a structural index of a GitHub-hosted repository \
    (file classification, import graph, key files, metrics) and answers natural-language \
    questions about it through a staged retrieval pipeline backed by a local Ollama model."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When the file does not exist, built-in defaults are used with
    /// `./data` as the data directory.
    #[arg(long, global = true, default_value = "./config/repolens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Index a repository.
    ///
    /// Fetches the file tree, classifies every file, fetches and analyzes
    /// key files, links the import graph, and persists the index plus its
    /// metrics. Refuses to overwrite an existing index unless `--force`.
    Index {
        /// Repository as `owner/repo`.
        repo: String,

        /// Branch to index. Falls back to the default branch, then the
        /// most recently committed branch.
        #[arg(long)]
        branch: Option<String>,

        /// Re-index even when a persisted index already exists.
        #[arg(long)]
        force: bool,
    },

    /// List a repository's branches with their last commit dates.
    Branches {
        /// Repository as `owner/repo`.
        repo: String,
    },

    /// List locally indexed repositories.
    List,

    /// Show structural metrics for an indexed repository.
    ///
    /// Folder and extension totals, most imported and most importing
    /// files, and detected entrypoints.
    Metrics {
        /// Repository as `owner/repo`.
        repo: String,

        /// Branch of the persisted index (defaults to `main`).
        #[arg(long, default_value = "main")]
        branch: String,
    },

    /// Literal search over an indexed repository's files.
    Search {
        /// Repository as `owner/repo`.
        repo: String,

        /// The search query string.
        query: String,

        /// Branch of the persisted index (defaults to `main`).
        #[arg(long, default_value = "main")]
        branch: String,
    },

    /// Ask a natural-language question about an indexed repository.
    ///
    /// Extracts topic signals, loads matching analysis sources, falls back
    /// to indexed-file descriptions, and asks the configured LLM. English
    /// and Spanish questions are supported.
    Ask {
        /// Repository as `owner/repo`.
        repo: String,

        /// The question, quoted.
        question: String,

        /// Branch of the persisted index (defaults to `main`).
        #[arg(long, default_value = "main")]
        branch: String,
    },
}

/// Split an `owner/repo` argument.
fn parse_repo(spec: &str) -> Result<(&str, &str)> {
    match spec.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner, repo))
        }
        _ => bail!("invalid repository '{}': expected owner/repo", spec),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = if cli.config.is_file() {
        config::load_config(&cli.config)?
    } else {
        Config::minimal(PathBuf::from("./data"))
    };

    match cli.command {
        Commands::Index {
            repo,
            branch,
            force,
        } => {
            let (owner, name) = parse_repo(&repo)?;
            run_index_command(&cfg, owner, name, branch.as_deref(), force).await?;
        }
        Commands::Branches { repo } => {
            let (owner, name) = parse_repo(&repo)?;
            let host = GitHubClient::new(&cfg.github)?;
            let branches = host.get_all_branches(owner, name).await?;
            println!("Branches of {}/{}:", owner, name);
            for branch in branches {
                match branch.commit_date {
                    Some(date) => println!("  {} (last commit {})", branch.name, date.to_rfc3339()),
                    None => println!("  {}", branch.name),
                }
            }
        }
        Commands::List => {
            let store = FsStore::new(&cfg.store);
            let keys = store.list_indexes()?;
            if keys.is_empty() {
                println!("No repositories indexed yet.");
            } else {
                for key in keys {
                    match store.load_index(&key) {
                        Ok(index) => println!(
                            "  {} [{}] {} files",
                            index.id,
                            status_label(&index.status),
                            index.summary.total_files
                        ),
                        Err(_) => println!("  {} [unreadable]", key),
                    }
                }
            }
        }
        Commands::Metrics { repo, branch } => {
            let (owner, name) = parse_repo(&repo)?;
            let store = FsStore::new(&cfg.store);
            let index = load_index_or_guide(&cfg, owner, name, &branch)?;
            let report = metrics::generate_metrics(&index);
            store.save_metrics(&report)?;
            print_metrics(&report);
        }
        Commands::Search {
            repo,
            query,
            branch,
        } => {
            let (owner, name) = parse_repo(&repo)?;
            let index = load_index_or_guide(&cfg, owner, name, &branch)?;
            let hits = search::search_files(&index.files, &query);
            if hits.is_empty() {
                println!("No files matched '{}'.", query);
            } else {
                println!("{} file(s) matched:", hits.len());
                for file in hits {
                    match &file.description {
                        Some(description) => println!("  {} — {}", file.path, description),
                        None => println!("  {}", file.path),
                    }
                }
            }
        }
        Commands::Ask {
            repo,
            question,
            branch,
        } => {
            let (owner, name) = parse_repo(&repo)?;
            run_ask_command(&cfg, owner, name, &branch, &question).await?;
        }
    }

    Ok(())
}

async fn run_index_command(
    cfg: &Config,
    owner: &str,
    repo: &str,
    requested_branch: Option<&str>,
    force: bool,
) -> Result<()> {
    let store = FsStore::new(&cfg.store);
    let host: Arc<dyn RepoHost> = Arc::new(GitHubClient::new(&cfg.github)?);

    let branch = host.resolve_branch(owner, repo, requested_branch).await?;
    if let Some(requested) = requested_branch {
        if requested != branch {
            println!("Branch '{}' not found, using '{}'.", requested, branch);
        }
    }

    let mut index = RepositoryIndex::shell(owner, repo, &branch);
    let key = index.storage_key();

    if store.index_exists(&key) && !force {
        println!("{} is already indexed. Use --force to re-index.", index.id);
        return Ok(());
    }

    store.acquire_lock(&key)?;
    store.save_index(&index)?;
    println!("Indexing {}…", index.id);

    let analyzer = JsConventionAnalyzer::new();
    let outcome = indexer::run_index(host, &analyzer, &cfg.indexer, &mut index).await;

    match outcome {
        Ok(()) => {
            index.status = IndexStatus::Completed;
            store.save_index(&index)?;
            let report = metrics::generate_metrics(&index);
            store.save_metrics(&report)?;
            store.release_lock(&key)?;
            println!(
                "Indexed {} files ({} lines) across {} languages.",
                index.summary.total_files,
                index.summary.total_lines,
                index.summary.languages.len()
            );
        }
        Err(err) => {
            index.status = IndexStatus::Error;
            store.save_index(&index)?;
            store.release_lock(&key)?;
            return Err(err).with_context(|| format!("indexing {} failed", index.id));
        }
    }

    Ok(())
}

async fn run_ask_command(
    cfg: &Config,
    owner: &str,
    repo: &str,
    branch: &str,
    question_text: &str,
) -> Result<()> {
    let store = FsStore::new(&cfg.store);
    let index = load_index_or_guide(cfg, owner, repo, branch)?;

    let analysis = question::analyze_question(question_text, cfg.pipeline.keyword_bridge);
    let selection = sources::select_json_sources(&analysis.signals, cfg.pipeline.max_json_sources);
    let analysis_dir = store.analysis_dir(&index.storage_key());
    let json_context = sources::load_and_filter(&analysis_dir, &selection, &analysis);

    let service = llm::create_service(&cfg.llm)?;
    let answer = pipeline::generate_answer(
        &index,
        &analysis,
        &json_context,
        &cfg.pipeline,
        service.as_ref(),
    )
    .await?;

    println!("{}", answer.answer);
    println!();
    println!("Confidence: {}", answer.confidence.as_str());
    if !answer.sources.json_sources.is_empty() {
        println!("Sources: {}", answer.sources.json_sources.join(", "));
    }
    if !answer.sources.files.is_empty() {
        println!("Files: {}", answer.sources.files.join(", "));
    }
    if let Some(notes) = &answer.notes {
        println!("Note: {}", notes);
    }

    Ok(())
}

fn load_index_or_guide(cfg: &Config, owner: &str, repo: &str, branch: &str) -> Result<RepositoryIndex> {
    let store = FsStore::new(&cfg.store);
    let key = models::storage_key(&RepositoryIndex::compose_id(owner, repo, branch));
    if !store.index_exists(&key) {
        bail!(
            "{}/{}@{} is not indexed yet. Run `repolens index {}/{} --branch {}` first.",
            owner,
            repo,
            branch,
            owner,
            repo,
            branch
        );
    }
    store.load_index(&key)
}

fn status_label(status: &IndexStatus) -> &'static str {
    match status {
        IndexStatus::Indexing => "indexing",
        IndexStatus::Completed => "completed",
        IndexStatus::Error => "error",
    }
}

fn print_metrics(report: &repolens::models::RepositoryMetrics) {
    println!("Metrics for {}:", report.repository_id);

    println!("\nFolders (≥2 files):");
    for (folder, totals) in &report.folders {
        let label = if folder.is_empty() { "(root)" } else { folder };
        println!("  {} — {} files, {} lines", label, totals.files, totals.lines);
    }

    println!("\nExtensions:");
    for (ext, totals) in &report.extensions {
        println!("  {} — {} files, {} lines", ext, totals.files, totals.lines);
    }

    if !report.most_imported.is_empty() {
        println!("\nMost imported:");
        for entry in &report.most_imported {
            println!("  {} ({})", entry.path, entry.count);
        }
    }

    if !report.most_importing.is_empty() {
        println!("\nMost importing:");
        for entry in &report.most_importing {
            println!("  {} ({})", entry.path, entry.count);
        }
    }

    if !report.entrypoints.is_empty() {
        println!("\nEntrypoints:");
        for entry in &report.entrypoints {
            let reason = match entry.reason {
                repolens::models::EntrypointReason::Filename => "filename",
                repolens::models::EntrypointReason::Location => "location",
            };
            println!("  {} ({})", entry.path, reason);
        }
    }
}
