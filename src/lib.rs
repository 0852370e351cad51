//! # RepoLens
//!
//! Repository intelligence for GitHub-hosted codebases.
//!
//! RepoLens indexes a repository through the GitHub API (file tree, key-file
//! contents, convention-based analysis, import graph, metrics) and answers
//! natural-language questions about it through a staged retrieval pipeline
//! backed by a local LLM.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐
//! │  GitHub   │──▶│ Indexer  │──▶│ FsStore   │
//! │   API     │   │ +Graph   │   │ (JSON)    │
//! └──────────┘   └──────────┘   └────┬──────┘
//!                                    │
//!              question ──▶ signals ──▶ sources ──▶ files
//!                                    │
//!                               ┌────▼─────┐
//!                               │  Ollama  │
//!                               └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! repolens index octocat/hello-world        # build and persist the index
//! repolens metrics octocat/hello-world      # folder/import/entrypoint stats
//! repolens search octocat/hello-world auth  # literal file search
//! repolens ask octocat/hello-world "how does the login flow work?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with per-section defaults |
//! | [`models`] | Persisted index, metrics, and file records |
//! | [`github`] | `RepoHost` trait and the GitHub REST client |
//! | [`analyzer`] | Convention-based file classification and insight extraction |
//! | [`graph`] | Import specifier resolution and relation linking |
//! | [`indexer`] | End-to-end index build with bounded concurrency |
//! | [`metrics`] | Folder, extension, import, and entrypoint aggregates |
//! | [`search`] | Literal substring search over indexed files |
//! | [`question`] | Question normalization, topic signals, keywords |
//! | [`sources`] | Auxiliary JSON source selection, loading, filtering |
//! | [`pipeline`] | File fallback, context assembly, confidence, LLM call |
//! | [`llm`] | `GenerationService` trait and the Ollama backend |
//! | [`store`] | Atomic filesystem persistence and indexing locks |

pub mod analyzer;
pub mod config;
pub mod github;
pub mod graph;
pub mod indexer;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod question;
pub mod search;
pub mod sources;
pub mod store;
