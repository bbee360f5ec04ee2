//! GitLab publisher (REST v4).
//!
//! - POST /projects/:id/merge_requests/:iid/discussions   (inline, text position)
//! - POST /projects/:id/merge_requests/:iid/notes         (review summary)

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::{Error, MrResult, ProviderError};
use crate::git_providers::{ChangeRequestId, CommentService, ProviderConfig};
use crate::publish::Position;

/// Prefix of the summary note posted on the merge request.
pub const SUMMARY_NOTE_PREFIX: &str = "Auto Review Result: \n";

#[derive(Debug, Clone)]
pub struct GitLabPublisher {
    http: reqwest::Client,
    headers: HeaderMap,
    base_api: String,
}

#[derive(Serialize)]
struct TextPosition<'a> {
    position_type: &'static str,
    #[serde(flatten)]
    position: &'a Position,
}

#[derive(Serialize)]
struct DiscussionReq<'a> {
    body: &'a str,
    position: TextPosition<'a>,
}

#[derive(Serialize)]
struct NoteReq<'a> {
    body: &'a str,
}

impl GitLabPublisher {
    pub fn from_config(cfg: &ProviderConfig) -> MrResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .pool_max_idle_per_host(8)
            .build()?;
        Ok(Self {
            http,
            headers: build_gitlab_headers(&cfg.token)?,
            base_api: cfg.base_api.trim_end_matches('/').to_string(),
        })
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

    /// Starts a discussion anchored at `position`. `Ok(false)` on a non-2xx answer.
    pub async fn post_inline(
        &self,
        id: &ChangeRequestId,
        position: &Position,
        body: &str,
    ) -> MrResult<bool> {
        let req = DiscussionReq {
            body,
            position: TextPosition {
                position_type: "text",
                position,
            },
        };
        debug!(
            "publish: inline POST path={} new_line={:?} old_line={:?}",
            position.new_path, position.new_line, position.old_line
        );
        let resp = self
            .http
            .post(self.mr_url(id, "discussions"))
            .headers(self.headers.clone())
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!(
                "publish: gitlab inline post refused: status={} body={:?}",
                status,
                resp.text().await.ok()
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Posts the summary report as a general MR note.
    pub async fn post_note(&self, id: &ChangeRequestId, report: &str) -> MrResult<()> {
        let body = format!("{SUMMARY_NOTE_PREFIX}{report}");
        debug!("publish: note POST {} ({} bytes)", id, body.len());
        let resp = self
            .http
            .post(self.mr_url(id, "notes"))
            .headers(self.headers.clone())
            .json(&NoteReq { body: &body })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!(
                "publish: gitlab note post failed: status={} body={:?}",
                status,
                resp.text().await.ok()
            );
            return Err(ProviderError::from_status(status.as_u16()).into());
        }
        Ok(())
    }
}

impl CommentService for GitLabPublisher {
    async fn submit(&self, id: &ChangeRequestId, position: &Position, body: &str) -> MrResult<bool> {
        self.post_inline(id, position, body).await
    }
}

fn build_gitlab_headers(token: &str) -> MrResult<HeaderMap> {
    let mut h = HeaderMap::new();
    h.insert(USER_AGENT, HeaderValue::from_static("mr-reviewer/0.1"));
    h.insert(ACCEPT, HeaderValue::from_static("application/json"));
    h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    h.insert(
        "PRIVATE-TOKEN",
        HeaderValue::from_str(token).map_err(|e| Error::Validation(format!("bad token: {e}")))?,
    );
    Ok(h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discussion_payload_shape() {
        let position = Position {
            base_sha: "b".into(),
            head_sha: "h".into(),
            start_sha: "s".into(),
            new_path: "src/a.py".into(),
            old_path: "src/a.py".into(),
            new_line: None,
            old_line: Some(8),
        };
        let req = DiscussionReq {
            body: "ℹ️ **Info**\n\nx",
            position: TextPosition {
                position_type: "text",
                position: &position,
            },
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["position"]["position_type"], "text");
        assert_eq!(v["position"]["base_sha"], "b");
        assert_eq!(v["position"]["old_line"], 8);
        assert!(v["position"].get("new_line").is_none());
    }

    #[test]
    fn token_goes_into_private_token_header() {
        let h = build_gitlab_headers("glpat-abc").unwrap();
        assert_eq!(h.get("PRIVATE-TOKEN").unwrap(), "glpat-abc");
        assert!(build_gitlab_headers("bad\ntoken").is_err());
    }

    #[test]
    fn urls_encode_project() {
        let cfg = ProviderConfig::new("https://gitlab.example.com", "t").unwrap();
        let p = GitLabPublisher::from_config(&cfg).unwrap();
        assert_eq!(
            p.mr_url(&ChangeRequestId::new("g/app", 3), "notes"),
            "https://gitlab.example.com/api/v4/projects/g%2Fapp/merge_requests/3/notes"
        );
    }
}
