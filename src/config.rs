use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub github: GithubConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Personal access token for private repos and higher rate limits.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token: None,
            user_agent: default_user_agent(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}
fn default_user_agent() -> String {
    "repolens".to_string()
}
fn default_http_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Directory holding index/metrics artifacts and analysis JSON files.
    pub data_dir: PathBuf,
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
}

fn default_lock_ttl_secs() -> u64 {
    600
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexerConfig {
    /// Hard cap on tree blob count; indexing aborts above this.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// In-flight window for key-file content fetches.
    #[serde(default = "default_key_file_concurrency")]
    pub key_file_concurrency: usize,
    /// Batch size for metadata-only bulk indexing.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            key_file_concurrency: default_key_file_concurrency(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_max_files() -> usize {
    10_000
}
fn default_key_file_concurrency() -> usize {
    4
}
fn default_batch_size() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Maximum distinct auxiliary JSON sources per question.
    #[serde(default = "default_max_json_sources")]
    pub max_json_sources: usize,
    /// Maximum indexed files selected as fallback context.
    #[serde(default = "default_max_context_files")]
    pub max_context_files: usize,
    /// Derive file-selection keywords from the normalized question's tokens.
    /// When false, the file-selection stage stays dormant and answering falls
    /// back to the plain search filter.
    #[serde(default = "default_keyword_bridge")]
    pub keyword_bridge: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_json_sources: default_max_json_sources(),
            max_context_files: default_max_context_files(),
            keyword_bridge: default_keyword_bridge(),
        }
    }
}

fn default_max_json_sources() -> usize {
    2
}
fn default_max_context_files() -> usize {
    5
}
fn default_keyword_bridge() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "ollama".to_string()
}
fn default_llm_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_llm_model() -> String {
    "llama3.2".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    300
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.indexer.max_files == 0 {
        anyhow::bail!("indexer.max_files must be > 0");
    }
    if config.indexer.key_file_concurrency == 0 {
        anyhow::bail!("indexer.key_file_concurrency must be > 0");
    }
    if config.indexer.batch_size == 0 {
        anyhow::bail!("indexer.batch_size must be > 0");
    }
    if config.pipeline.max_json_sources == 0 {
        anyhow::bail!("pipeline.max_json_sources must be > 0");
    }
    if config.store.lock_ttl_secs == 0 {
        anyhow::bail!("store.lock_ttl_secs must be > 0");
    }

    match config.llm.provider.as_str() {
        "ollama" => {}
        other => anyhow::bail!("Unknown llm provider: '{}'. Only ollama is supported.", other),
    }

    Ok(config)
}

impl Config {
    /// A minimal in-memory config for tests and ad-hoc commands.
    pub fn minimal(data_dir: PathBuf) -> Self {
        Self {
            github: GithubConfig::default(),
            store: StoreConfig {
                data_dir,
                lock_ttl_secs: default_lock_ttl_secs(),
            },
            indexer: IndexerConfig::default(),
            pipeline: PipelineConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}
