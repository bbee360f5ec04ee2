//! Provider-agnostic data model for change requests (MR/PR) and raw diffs.
//!
//! These are the inputs of the pipeline: what the diff source delivers before
//! any filtering or parsing happens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unique reference to a change request inside a provider.
///
/// * `project` – GitLab numeric ID or "group/project".
/// * `iid`     – GitLab MR IID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequestId {
    pub project: String,
    pub iid: u64,
}

impl ChangeRequestId {
    pub fn new(project: impl Into<String>, iid: u64) -> Self {
        Self {
            project: project.into(),
            iid,
        }
    }
}

impl std::fmt::Display for ChangeRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}!{}", self.project, self.iid)
    }
}

impl std::str::FromStr for ChangeRequestId {
    type Err = crate::errors::Error;

    /// Parses `group/project!42`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (project, iid) = s.rsplit_once('!').ok_or_else(|| {
            crate::errors::Error::Validation(format!("expected <project>!<iid>, got {s:?}"))
        })?;
        let iid = iid
            .trim()
            .parse::<u64>()
            .map_err(|_| crate::errors::Error::Validation(format!("bad iid in {s:?}")))?;
        if project.trim().is_empty() {
            return Err(crate::errors::Error::Validation(format!(
                "empty project in {s:?}"
            )));
        }
        Ok(Self::new(project.trim(), iid))
    }
}

/// One file's raw diff as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChange {
    pub new_path: String,
    pub old_path: String,
    /// Unified diff text (hunks, optionally with `---`/`+++` headers).
    pub diff_text: String,
    pub deleted: bool,
    #[serde(default)]
    pub renamed: bool,
}

/// A single commit belonging to the MR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrCommit {
    pub id: String,
    pub title: String,
    pub message: Option<String>,
    pub author_name: Option<String>,
    pub authored_at: Option<DateTime<Utc>>,
}

/// Commit titles joined with `;`, handed to the reviewer as auxiliary context.
pub fn commit_summary(commits: &[CrCommit]) -> String {
    commits
        .iter()
        .map(|c| c.title.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(";")
}

/// Triple of SHAs of the latest MR diff version, used to anchor inline comments.
///
/// Any of the three may be missing in a provider answer; positioning refuses
/// to run unless all are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTriple {
    pub base_sha: Option<String>,
    pub head_sha: Option<String>,
    pub start_sha: Option<String>,
}

impl VersionTriple {
    /// `(base, head, start)` when all three are present and non-empty.
    pub fn complete(&self) -> Option<(&str, &str, &str)> {
        fn present(s: &Option<String>) -> Option<&str> {
            s.as_deref().map(str::trim).filter(|v| !v.is_empty())
        }
        Some((
            present(&self.base_sha)?,
            present(&self.head_sha)?,
            present(&self.start_sha)?,
        ))
    }
}
