//! GitLab provider (REST v4): raw MR diffs, commits and diff versions.
//!
//! Endpoints used:
//! - GET /projects/:id/merge_requests/:iid/changes   (per-file unified diffs)
//! - GET /projects/:id/merge_requests/:iid/commits
//! - GET /projects/:id/merge_requests/:iid/versions  (newest first)

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::errors::MrResult;
use crate::git_providers::types::*;
use crate::git_providers::{DiffSource, ProviderConfig, VersionService};

#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: Client,
    base_api: String, // e.g. "https://gitlab.com/api/v4"
    token: String,    // "PRIVATE-TOKEN"
}

impl GitLabClient {
    /// Constructs a GitLab client with a shared reqwest instance and auth token.
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api: base_api.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Builds the HTTP client as well.
    pub fn from_config(cfg: &ProviderConfig) -> MrResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent("mr-reviewer/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self::new(http, cfg.base_api.clone(), cfg.token.clone()))
    }

    fn mr_url(&self, id: &ChangeRequestId, tail: &str) -> String {
        format!(
            "{}/projects/{}/merge_requests/{}/{}",
            self.base_api,
            urlencoding::encode(&id.project),
            id.iid,
            tail
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> MrResult<T> {
        debug!("gitlab: GET {}", url);
        let out = self
            .http
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(out)
    }

    /// Fetches per-file raw diffs of the MR.
    pub async fn get_changes(&self, id: &ChangeRequestId) -> MrResult<Vec<RawChange>> {
        let resp: GitLabMrChanges = self.get_json(self.mr_url(id, "changes")).await?;
        let changes: Vec<RawChange> = resp.changes.into_iter().map(RawChange::from).collect();
        debug!("gitlab: {} changes for {}", changes.len(), id);
        Ok(changes)
    }

    /// Fetches commits attached to the MR.
    pub async fn get_commits(&self, id: &ChangeRequestId) -> MrResult<Vec<CrCommit>> {
        let raw: Vec<GitLabMrCommit> = self.get_json(self.mr_url(id, "commits")).await?;
        Ok(raw.into_iter().map(CrCommit::from).collect())
    }

    /// Latest diff version (GitLab lists versions newest first).
    pub async fn get_latest_version(&self, id: &ChangeRequestId) -> MrResult<Option<VersionTriple>> {
        let raw: Vec<GitLabMrVersion> = self.get_json(self.mr_url(id, "versions")).await?;
        Ok(latest_of(raw))
    }
}

impl DiffSource for GitLabClient {
    async fn fetch_changes(&self, id: &ChangeRequestId) -> MrResult<Vec<RawChange>> {
        self.get_changes(id).await
    }

    async fn fetch_commits(&self, id: &ChangeRequestId) -> MrResult<Vec<CrCommit>> {
        self.get_commits(id).await
    }
}

impl VersionService for GitLabClient {
    async fn latest_version(&self, id: &ChangeRequestId) -> MrResult<Option<VersionTriple>> {
        self.get_latest_version(id).await
    }
}

fn latest_of(versions: Vec<GitLabMrVersion>) -> Option<VersionTriple> {
    versions.into_iter().next().map(|v| VersionTriple {
        base_sha: v.base_commit_sha,
        head_sha: v.head_commit_sha,
        start_sha: v.start_commit_sha,
    })
}

/* --------------------- GitLab API DTOs (minimal) --------------------- */

#[derive(Debug, Deserialize)]
struct GitLabMrChanges {
    #[serde(default)]
    changes: Vec<GitLabChange>,
}

#[derive(Debug, Deserialize)]
struct GitLabChange {
    old_path: String,
    new_path: String,
    #[serde(default)]
    diff: Option<String>,
    #[serde(default)]
    deleted_file: bool,
    #[serde(default)]
    renamed_file: bool,
}

impl From<GitLabChange> for RawChange {
    fn from(c: GitLabChange) -> Self {
        RawChange {
            new_path: c.new_path,
            old_path: c.old_path,
            diff_text: c.diff.unwrap_or_default(),
            deleted: c.deleted_file,
            renamed: c.renamed_file,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitLabMrCommit {
    id: String,
    title: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    author_name: Option<String>,
    #[serde(default)]
    authored_date: Option<DateTime<Utc>>,
}

impl From<GitLabMrCommit> for CrCommit {
    fn from(c: GitLabMrCommit) -> Self {
        CrCommit {
            id: c.id,
            title: c.title,
            message: c.message,
            author_name: c.author_name,
            authored_at: c.authored_date,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitLabMrVersion {
    #[serde(default)]
    head_commit_sha: Option<String>,
    #[serde(default)]
    base_commit_sha: Option<String>,
    #[serde(default)]
    start_commit_sha: Option<String>,
}
