//! Remote tree/blob source.
//!
//! [`RepoHost`] is the seam between the indexer and the hosting API. The
//! production implementation, [`GitHubClient`], talks to the GitHub REST v3
//! API; tests swap in mock hosts. Branch resolution follows a fallback chain:
//! requested → validated → default → most-recently-committed.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::config::GithubConfig;
use crate::models::RepoMetadata;

/// One entry of a recursive tree listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    /// `"blob"` for files, `"tree"` for directories.
    #[serde(rename = "type")]
    pub entry_type: String,
    pub sha: String,
    #[serde(default)]
    pub size: u64,
}

/// A repository's full recursive file tree.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoTree {
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

/// Decoded content of a single file.
#[derive(Debug, Clone)]
pub struct FileContent {
    pub content: String,
    pub sha: String,
    pub size: u64,
}

/// A branch with its head commit.
#[derive(Debug, Clone)]
pub struct Branch {
    pub name: String,
    pub commit_sha: String,
    pub commit_date: Option<DateTime<Utc>>,
}

/// Read-only view of a hosted repository.
#[async_trait]
pub trait RepoHost: Send + Sync {
    async fn get_tree(&self, owner: &str, repo: &str, branch: &str) -> Result<RepoTree>;

    async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<FileContent>;

    async fn get_repo_metadata(&self, owner: &str, repo: &str) -> Result<RepoMetadata>;

    async fn get_last_commit(&self, owner: &str, repo: &str, branch: &str) -> Result<String>;

    async fn get_all_branches(&self, owner: &str, repo: &str) -> Result<Vec<Branch>>;

    async fn branch_exists(&self, owner: &str, repo: &str, branch: &str) -> Result<bool> {
        let branches = self.get_all_branches(owner, repo).await?;
        Ok(branches.iter().any(|b| b.name == branch))
    }

    /// Resolve the branch to index.
    ///
    /// Chain: the requested branch if it exists, else the repository's
    /// default branch if it exists, else the most recently committed branch.
    /// Fails only when the repository has no branches at all.
    async fn resolve_branch(
        &self,
        owner: &str,
        repo: &str,
        requested: Option<&str>,
    ) -> Result<String> {
        let branches = self.get_all_branches(owner, repo).await?;

        if let Some(name) = requested {
            if branches.iter().any(|b| b.name == name) {
                return Ok(name.to_string());
            }
        }

        let metadata = self.get_repo_metadata(owner, repo).await?;
        if branches.iter().any(|b| b.name == metadata.default_branch) {
            return Ok(metadata.default_branch);
        }

        let mut dated: Vec<&Branch> = branches.iter().collect();
        dated.sort_by(|a, b| b.commit_date.cmp(&a.commit_date));
        match dated.first() {
            Some(branch) => Ok(branch.name.clone()),
            None => bail!("Repository {}/{} has no branches", owner, repo),
        }
    }
}

// ============ GitHub REST implementation ============

/// GitHub REST v3 client.
///
/// Token and endpoint come from configuration; nothing is read from
/// process-global state.
pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build GitHub HTTP client")?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut req = self.client.get(url);
        if let Some(ref token) = self.token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("GitHub request failed: {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("GitHub API error {} for {}: {}", status, url, body.trim());
        }

        resp.json::<T>()
            .await
            .with_context(|| format!("Invalid GitHub response from {}", url))
    }
}

#[derive(Debug, Deserialize)]
struct WireRepo {
    description: Option<String>,
    language: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    topics: Vec<String>,
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    content: String,
    encoding: String,
    sha: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct WireCommitRef {
    sha: String,
    #[serde(default)]
    commit: Option<WireCommitDetail>,
}

#[derive(Debug, Deserialize)]
struct WireCommitDetail {
    committer: Option<WireCommitActor>,
}

#[derive(Debug, Deserialize)]
struct WireCommitActor {
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WireBranch {
    name: String,
    commit: WireCommitRef,
}

#[async_trait]
impl RepoHost for GitHubClient {
    async fn get_tree(&self, owner: &str, repo: &str, branch: &str) -> Result<RepoTree> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_base, owner, repo, branch
        );
        self.get_json(&url).await
    }

    async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<FileContent> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}?ref={}",
            self.api_base, owner, repo, path, branch
        );
        let wire: WireContent = self.get_json(&url).await?;

        let content = match wire.encoding.as_str() {
            "base64" => decode_blob(&wire.content)?,
            // The contents API occasionally returns small files inline.
            _ => wire.content,
        };

        Ok(FileContent {
            content,
            sha: wire.sha,
            size: wire.size,
        })
    }

    async fn get_repo_metadata(&self, owner: &str, repo: &str) -> Result<RepoMetadata> {
        let url = format!("{}/repos/{}/{}", self.api_base, owner, repo);
        let wire: WireRepo = self.get_json(&url).await?;
        Ok(RepoMetadata {
            description: wire.description,
            language: wire.language,
            stars: wire.stargazers_count,
            forks: wire.forks_count,
            topics: wire.topics,
            default_branch: wire.default_branch,
        })
    }

    async fn get_last_commit(&self, owner: &str, repo: &str, branch: &str) -> Result<String> {
        let url = format!("{}/repos/{}/{}/commits/{}", self.api_base, owner, repo, branch);
        let wire: WireCommitRef = self.get_json(&url).await?;
        Ok(wire.sha)
    }

    async fn get_all_branches(&self, owner: &str, repo: &str) -> Result<Vec<Branch>> {
        let url = format!(
            "{}/repos/{}/{}/branches?per_page=100",
            self.api_base, owner, repo
        );
        let wire: Vec<WireBranch> = self.get_json(&url).await?;

        let mut branches = Vec::with_capacity(wire.len());
        for b in wire {
            // The branches listing omits commit dates; fetch the head commit
            // so the most-recently-committed fallback has something to sort on.
            let date = match self.get_last_commit_detail(owner, repo, &b.commit.sha).await {
                Ok(d) => d,
                Err(_) => None,
            };
            branches.push(Branch {
                name: b.name,
                commit_sha: b.commit.sha,
                commit_date: date,
            });
        }
        Ok(branches)
    }
}

impl GitHubClient {
    async fn get_last_commit_detail(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let url = format!("{}/repos/{}/{}/commits/{}", self.api_base, owner, repo, sha);
        let wire: WireCommitRef = self.get_json(&url).await?;
        Ok(wire
            .commit
            .and_then(|c| c.committer)
            .and_then(|c| c.date))
    }
}

/// Decode a base64 blob as returned by the contents API (line-wrapped).
pub fn decode_blob(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(compact.as_bytes())
        .context("Invalid base64 in blob content")?;
    Ok(String::from_utf8_lossy(&bytes).to_string())
}
