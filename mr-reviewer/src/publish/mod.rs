//! Line positioning and submission of findings.
//!
//! - One version lookup per run; its SHA triple is reused for every finding.
//! - Each finding becomes a text [`Position`] (`new_line` for added lines,
//!   `old_line` for removed ones, both for unchanged lines).
//! - Bodies are prefixed with a severity marker.
//! - Failures are folded into per-finding outcomes; the caller gets
//!   `{success_count, total}` and decides what an incomplete count means.

pub mod gitlab;

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::git_providers::{ChangeRequestId, CommentService, VersionService};
use crate::parser::{ChangeKind, ParsedFileChange};
use crate::review::findings::{LineFinding, Severity};

/// Host line-comment position (GitLab `position_type = text`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub base_sha: String,
    pub head_sha: String,
    pub start_sha: String,
    pub new_path: String,
    pub old_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindingOutcome {
    Submitted,
    /// The host refused the comment or the request failed.
    Rejected(String),
    /// Not sent: missing fields or no usable diff version.
    Skipped(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitSummary {
    pub success_count: usize,
    pub total: usize,
    /// One entry per input finding, in input order.
    pub outcomes: Vec<FindingOutcome>,
}

impl SubmitSummary {
    pub fn is_complete(&self) -> bool {
        self.success_count == self.total
    }

    fn all_skipped(findings: &[LineFinding], reason: &str) -> Self {
        Self {
            success_count: 0,
            total: findings.len(),
            outcomes: vec![FindingOutcome::Skipped(reason.to_string()); findings.len()],
        }
    }
}

/// Which lines of a file are added, removed or unchanged in the diff.
#[derive(Debug, Clone, Default)]
struct FileAnchors {
    old_path: Option<String>,
    added: HashSet<u32>,
    removed: HashSet<u32>,
    /// new line -> old line
    unchanged: HashMap<u32, u32>,
}

/// Line classification built from the parsed changes of the run.
#[derive(Debug, Clone, Default)]
pub struct LineAnchors {
    files: HashMap<String, FileAnchors>,
}

impl LineAnchors {
    pub fn from_parsed(files: &[ParsedFileChange]) -> Self {
        let mut out = HashMap::with_capacity(files.len());
        for f in files {
            let mut a = FileAnchors {
                old_path: f.old_path.clone(),
                ..Default::default()
            };
            for c in &f.changes {
                match (c.kind, c.old_line, c.new_line) {
                    (ChangeKind::Add, _, Some(n)) => {
                        a.added.insert(n);
                    }
                    (ChangeKind::Delete, Some(o), _) => {
                        a.removed.insert(o);
                    }
                    (ChangeKind::Context, Some(o), Some(n)) => {
                        a.unchanged.insert(n, o);
                    }
                    _ => {}
                }
            }
            out.insert(f.path.clone(), a);
        }
        Self { files: out }
    }

    /// `(new_line, old_line, old_path)` for a finding on `path`.
    fn resolve(
        &self,
        path: &str,
        line: u32,
        old_line: Option<u32>,
    ) -> (Option<u32>, Option<u32>, Option<&str>) {
        let Some(a) = self.files.get(path) else {
            return (Some(line), old_line, None);
        };
        let old_path = a.old_path.as_deref();
        if a.added.contains(&line) {
            (Some(line), None, old_path)
        } else if let Some(o) = a.unchanged.get(&line) {
            (Some(line), Some(*o), old_path)
        } else if let Some(o) = old_line.filter(|o| a.removed.contains(o)) {
            (None, Some(o), old_path)
        } else {
            (Some(line), old_line, old_path)
        }
    }
}

/// Comment body with the severity marker, e.g. `🚨 **Critical**`.
pub fn render_body(severity: Severity, comment: &str) -> String {
    format!("{} **{}**\n\n{}", severity.emoji(), severity.label(), comment.trim())
}

#[derive(Debug, Clone, Default)]
pub struct LinePositionMapper {
    anchors: Option<LineAnchors>,
}

impl LinePositionMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the parsed diff to decide which side(s) of the diff a line is on.
    pub fn with_anchors(mut self, anchors: LineAnchors) -> Self {
        self.anchors = Some(anchors);
        self
    }

    pub async fn map_and_submit<V, S>(
        &self,
        id: &ChangeRequestId,
        findings: &[LineFinding],
        version_lookup: &V,
        comment_sink: &S,
    ) -> SubmitSummary
    where
        V: VersionService,
        S: CommentService,
    {
        let t0 = Instant::now();

        let version = match version_lookup.latest_version(id).await {
            Ok(Some(v)) => v,
            Ok(None) => {
                warn!("publish: no diff version for {}", id);
                return SubmitSummary::all_skipped(findings, "no diff version");
            }
            Err(e) => {
                warn!("publish: version lookup failed for {}: {}", id, e);
                return SubmitSummary::all_skipped(findings, "version lookup failed");
            }
        };
        let Some((base_sha, head_sha, start_sha)) = version.complete() else {
            warn!("publish: incomplete version triple for {}: {:?}", id, version);
            return SubmitSummary::all_skipped(findings, "incomplete version triple");
        };

        let mut summary = SubmitSummary {
            success_count: 0,
            total: findings.len(),
            outcomes: Vec::with_capacity(findings.len()),
        };

        for (i, f) in findings.iter().enumerate() {
            let (path, line, comment) = match (&f.file_path, f.line_number, &f.comment) {
                (Some(p), Some(l), Some(c)) if !p.trim().is_empty() && !c.trim().is_empty() => {
                    (p.as_str(), l, c.as_str())
                }
                _ => {
                    debug!("publish: skip finding #{} (missing path, line or comment)", i);
                    summary
                        .outcomes
                        .push(FindingOutcome::Skipped("missing path, line or comment".into()));
                    continue;
                }
            };

            let (new_line, old_line, old_path) = match &self.anchors {
                Some(a) => a.resolve(path, line, f.old_line),
                None => (Some(line), f.old_line, None),
            };
            let position = Position {
                base_sha: base_sha.to_string(),
                head_sha: head_sha.to_string(),
                start_sha: start_sha.to_string(),
                new_path: path.to_string(),
                old_path: old_path.unwrap_or(path).to_string(),
                new_line,
                old_line,
            };
            let body = render_body(f.severity, comment);

            match comment_sink.submit(id, &position, &body).await {
                Ok(true) => {
                    summary.success_count += 1;
                    summary.outcomes.push(FindingOutcome::Submitted);
                }
                Ok(false) => {
                    warn!("publish: host refused comment on {}:{}", path, line);
                    summary
                        .outcomes
                        .push(FindingOutcome::Rejected("refused by host".into()));
                }
                Err(e) => {
                    warn!("publish: submit failed on {}:{}: {}", path, line, e);
                    summary.outcomes.push(FindingOutcome::Rejected(e.to_string()));
                }
            }
        }

        info!(
            "publish: {}/{} comments submitted in {} ms",
            summary.success_count,
            summary.total,
            t0.elapsed().as_millis()
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Error, MrResult, ProviderError};
    use crate::git_providers::VersionTriple;
    use crate::parser;
    use std::sync::Mutex;

    struct FixedVersion(MrResult<Option<VersionTriple>>);

    impl VersionService for FixedVersion {
        async fn latest_version(&self, _id: &ChangeRequestId) -> MrResult<Option<VersionTriple>> {
            match &self.0 {
                Ok(v) => Ok(v.clone()),
                Err(_) => Err(Error::Provider(ProviderError::NotFound)),
            }
        }
    }

    /// Accepts every comment except on line 13; line 99 fails in transport.
    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(Position, String)>>,
    }

    impl CommentService for RecordingSink {
        async fn submit(&self, _id: &ChangeRequestId, position: &Position, body: &str) -> MrResult<bool> {
            if position.new_line == Some(99) {
                return Err(Error::Provider(ProviderError::Timeout));
            }
            self.sent
                .lock()
                .unwrap()
                .push((position.clone(), body.to_string()));
            Ok(position.new_line != Some(13))
        }
    }

    fn full_version() -> FixedVersion {
        FixedVersion(Ok(Some(VersionTriple {
            base_sha: Some("base".into()),
            head_sha: Some("head".into()),
            start_sha: Some("start".into()),
        })))
    }

    fn finding(line: Option<u32>, severity: Severity) -> LineFinding {
        LineFinding {
            file_path: Some("app.py".into()),
            line_number: line,
            old_line: None,
            comment: Some("check this".into()),
            severity,
        }
    }

    fn id() -> ChangeRequestId {
        ChangeRequestId::new("group/app", 1)
    }

    #[tokio::test]
    async fn missing_line_number_is_skipped_but_counted() {
        let sink = RecordingSink::default();
        let findings = vec![finding(Some(3), Severity::Warning), finding(None, Severity::Info)];
        let s = LinePositionMapper::new()
            .map_and_submit(&id(), &findings, &full_version(), &sink)
            .await;

        assert_eq!(s.total, 2);
        assert_eq!(s.success_count, 1);
        assert_eq!(s.outcomes[0], FindingOutcome::Submitted);
        assert!(matches!(s.outcomes[1], FindingOutcome::Skipped(_)));

        let sent = sink.sent.lock().unwrap();
        let (pos, body) = &sent[0];
        assert_eq!(
            (pos.base_sha.as_str(), pos.head_sha.as_str(), pos.start_sha.as_str()),
            ("base", "head", "start")
        );
        assert_eq!((pos.new_path.as_str(), pos.old_path.as_str()), ("app.py", "app.py"));
        assert_eq!(pos.new_line, Some(3));
        assert_eq!(body, "⚠️ **Warning**\n\ncheck this");
    }

    #[tokio::test]
    async fn partial_failures_are_counted() {
        let sink = RecordingSink::default();
        let findings = vec![
            finding(Some(1), Severity::Critical),
            finding(Some(13), Severity::Critical),
            finding(Some(99), Severity::Critical),
            finding(Some(2), Severity::Suggestion),
        ];
        let s = LinePositionMapper::new()
            .map_and_submit(&id(), &findings, &full_version(), &sink)
            .await;
        assert_eq!((s.success_count, s.total), (2, 4));
        assert!(!s.is_complete());
        assert!(matches!(s.outcomes[1], FindingOutcome::Rejected(_)));
        assert!(matches!(s.outcomes[2], FindingOutcome::Rejected(_)));
        assert_eq!(s.outcomes[3], FindingOutcome::Submitted);
    }

    #[tokio::test]
    async fn unusable_version_skips_everything() {
        let findings = vec![finding(Some(1), Severity::Info); 3];
        let incomplete = FixedVersion(Ok(Some(VersionTriple {
            base_sha: Some("b".into()),
            head_sha: None,
            start_sha: Some("s".into()),
        })));
        for versions in [incomplete, FixedVersion(Ok(None)), FixedVersion(Err(Error::Validation(String::new())))] {
            let sink = RecordingSink::default();
            let s = LinePositionMapper::new()
                .map_and_submit(&id(), &findings, &versions, &sink)
                .await;
            assert_eq!((s.success_count, s.total), (0, 3));
            assert!(s.outcomes.iter().all(|o| matches!(o, FindingOutcome::Skipped(_))));
            assert!(sink.sent.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn anchors_pick_diff_sides() {
        let diff = "@@ -10,3 +10,3 @@\n a\n-b\n+c\n d\n";
        let parsed = vec![parser::parse(diff, "app.py", Some("old_app.py"))];
        let mapper = LinePositionMapper::new().with_anchors(LineAnchors::from_parsed(&parsed));

        let mut on_removed = finding(Some(500), Severity::Info);
        on_removed.old_line = Some(11);
        let findings = vec![
            finding(Some(11), Severity::Info), // added
            finding(Some(10), Severity::Info), // unchanged
            on_removed,
        ];
        let sink = RecordingSink::default();
        let s = mapper
            .map_and_submit(&id(), &findings, &full_version(), &sink)
            .await;
        assert_eq!(s.success_count, 3);

        let sent = sink.sent.lock().unwrap();
        let lines: Vec<_> = sent.iter().map(|(p, _)| (p.new_line, p.old_line)).collect();
        assert_eq!(lines, vec![(Some(11), None), (Some(10), Some(10)), (None, Some(11))]);
        assert!(sent.iter().all(|(p, _)| p.old_path == "old_app.py"));
    }

    #[test]
    fn position_omits_absent_lines() {
        let p = Position {
            base_sha: "b".into(),
            head_sha: "h".into(),
            start_sha: "s".into(),
            new_path: "a.py".into(),
            old_path: "a.py".into(),
            new_line: Some(4),
            old_line: None,
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["new_line"], 4);
        assert!(v.get("old_line").is_none());
    }
}
