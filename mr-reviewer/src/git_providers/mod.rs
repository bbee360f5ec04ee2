//! Collaborator seams of the hosting VCS, plus the GitLab implementation.
//!
//! The pipeline is generic over three narrow capabilities:
//! - [`DiffSource`]     – raw per-file diffs and commits of a change request
//! - [`VersionService`] – latest diff version (base/head/start SHAs)
//! - [`CommentService`] – submit one positioned inline comment
//!
//! They use plain `async fn`-style futures (no `async-trait`, no `Box<dyn ...>`);
//! callers stay generic and tests plug in in-memory fakes.

pub mod gitlab;
pub mod types;

pub use types::*;

use std::future::Future;

use crate::errors::{ConfigError, MrResult};
use crate::publish::Position;

/// Source of raw changes for a change request. May return an empty list.
pub trait DiffSource: Send + Sync {
    fn fetch_changes(
        &self,
        id: &ChangeRequestId,
    ) -> impl Future<Output = MrResult<Vec<RawChange>>> + Send;

    fn fetch_commits(
        &self,
        id: &ChangeRequestId,
    ) -> impl Future<Output = MrResult<Vec<CrCommit>>> + Send;
}

/// Latest diff version of a change request; `Ok(None)` when the host has none.
pub trait VersionService: Send + Sync {
    fn latest_version(
        &self,
        id: &ChangeRequestId,
    ) -> impl Future<Output = MrResult<Option<VersionTriple>>> + Send;
}

/// Inline comment sink. `Ok(true)` means the host accepted it (2xx).
pub trait CommentService: Send + Sync {
    fn submit(
        &self,
        id: &ChangeRequestId,
        position: &Position,
        body: &str,
    ) -> impl Future<Output = MrResult<bool>> + Send;
}

/// Runtime configuration of the GitLab provider client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API base, e.g. "https://gitlab.com/api/v4"
    pub base_api: String,
    /// Access token (PAT or project token).
    pub token: String,
}

impl ProviderConfig {
    /// Reads `GITLAB_URL` (host root; `/api/v4` is appended when absent) and
    /// `GITLAB_ACCESS_TOKEN`.
    pub fn from_env() -> MrResult<Self> {
        let url = std::env::var("GITLAB_URL").unwrap_or_else(|_| "https://gitlab.com".into());
        let token = std::env::var("GITLAB_ACCESS_TOKEN").unwrap_or_default();
        Self::new(&url, &token)
    }

    pub fn new(url: &str, token: &str) -> MrResult<Self> {
        let url = url.trim().trim_end_matches('/');
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(url.to_string()).into());
        }
        if token.trim().is_empty() {
            return Err(ConfigError::MissingToken.into());
        }
        let base_api = if url.ends_with("/api/v4") {
            url.to_string()
        } else {
            format!("{url}/api/v4")
        };
        Ok(Self {
            base_api,
            token: token.trim().to_string(),
        })
    }
}
