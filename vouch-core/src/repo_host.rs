//! Repository host boundary: contributor, metadata and review lookups.
//!
//! Metrics treat every lookup as best-effort. A failure here degrades one
//! sub-score to neutral and never fails a scoring request.

use crate::config::RepoHostConfig;
use crate::error::RepoHostError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Owner/name pair identifying a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Parse a GitHub repository URL such as `https://github.com/owner/name.git`.
    pub fn parse(raw: &str) -> Result<Self, RepoHostError> {
        let invalid = || RepoHostError::InvalidUrl(raw.to_string());
        let url = Url::parse(raw.trim()).map_err(|_| invalid())?;

        match url.host_str() {
            Some("github.com") | Some("www.github.com") => {}
            _ => return Err(invalid()),
        }

        let mut segments = url
            .path_segments()
            .ok_or_else(invalid)?
            .filter(|s| !s.is_empty());
        let owner = segments.next().ok_or_else(invalid)?;
        let name = segments.next().ok_or_else(invalid)?;
        let name = name.strip_suffix(".git").unwrap_or(name);
        if name.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Subset of repository metadata used for scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub archived: bool,
    pub description: Option<String>,
    /// SPDX identifier reported by the host, if it recognised one.
    pub license: Option<String>,
    pub stars: u64,
}

/// Merged pull requests and how many of them carried an approving review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub merged: u64,
    pub reviewed: u64,
}

#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Commit counts per contributor.
    async fn contributor_commits(&self, repo: &RepoRef) -> Result<Vec<u64>, RepoHostError>;

    async fn repository(&self, repo: &RepoRef) -> Result<RepoMetadata, RepoHostError>;

    /// Merged and approved pull request counts. Fails as a whole if either
    /// count cannot be read.
    async fn review_stats(&self, repo: &RepoRef) -> Result<ReviewStats, RepoHostError>;
}

/// GitHub REST API client.
pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(config: &RepoHostConfig) -> Result<Self, RepoHostError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.request_timeout_secs.min(10)))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| RepoHostError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    async fn get_json(
        &self,
        repo: &RepoRef,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, RepoHostError> {
        let url = format!("{}/{}", self.api_base, path);
        debug!(repo = %repo, url = %url, "Repository host request");

        let mut request = self
            .client
            .get(&url)
            .query(query)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RepoHostError::Request(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RepoHostError::NotFound {
                repo: repo.to_string(),
            });
        }
        if !status.is_success() {
            return Err(RepoHostError::Status {
                repo: repo.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| RepoHostError::Request(format!("invalid response body: {e}")))
    }

    async fn search_count(&self, repo: &RepoRef, q: &str) -> Result<u64, RepoHostError> {
        let body = self
            .get_json(repo, "search/issues", &[("q", q), ("per_page", "1")])
            .await?;
        Ok(body.get("total_count").and_then(|v| v.as_u64()).unwrap_or(0))
    }
}

#[async_trait]
impl RepoHost for GitHubClient {
    async fn contributor_commits(&self, repo: &RepoRef) -> Result<Vec<u64>, RepoHostError> {
        let path = format!("repos/{}/{}/contributors", repo.owner, repo.name);
        let body = self.get_json(repo, &path, &[("per_page", "100")]).await?;
        Ok(parse_contributors(&body))
    }

    async fn repository(&self, repo: &RepoRef) -> Result<RepoMetadata, RepoHostError> {
        let path = format!("repos/{}/{}", repo.owner, repo.name);
        let body = self.get_json(repo, &path, &[]).await?;
        Ok(parse_repository(&body))
    }

    async fn review_stats(&self, repo: &RepoRef) -> Result<ReviewStats, RepoHostError> {
        let merged_q = format!("repo:{repo} is:pr is:merged");
        let reviewed_q = format!("{merged_q} review:approved");
        let merged = self.search_count(repo, &merged_q).await?;
        let reviewed = self.search_count(repo, &reviewed_q).await?;
        Ok(ReviewStats { merged, reviewed })
    }
}

fn parse_contributors(body: &serde_json::Value) -> Vec<u64> {
    body.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|c| c.get("contributions").and_then(|v| v.as_u64()))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_repository(body: &serde_json::Value) -> RepoMetadata {
    let license = body
        .get("license")
        .and_then(|l| l.get("spdx_id"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty() && *s != "NOASSERTION")
        .map(String::from);
    let description = body
        .get("description")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    RepoMetadata {
        archived: body.get("archived").and_then(|v| v.as_bool()).unwrap_or(false),
        description,
        license,
        stars: body
            .get("stargazers_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
    }
}

/// Host used when lookups are disabled; every call reports `Unavailable`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineRepoHost;

#[async_trait]
impl RepoHost for OfflineRepoHost {
    async fn contributor_commits(&self, _repo: &RepoRef) -> Result<Vec<u64>, RepoHostError> {
        Err(RepoHostError::Unavailable)
    }

    async fn repository(&self, _repo: &RepoRef) -> Result<RepoMetadata, RepoHostError> {
        Err(RepoHostError::Unavailable)
    }

    async fn review_stats(&self, _repo: &RepoRef) -> Result<ReviewStats, RepoHostError> {
        Err(RepoHostError::Unavailable)
    }
}
