//! Review orchestration over a [`CompletionService`].
//!
//! Flow:
//!   1) one batch  → one completion call, fence stripped, returned as is;
//!   2) N batches  → one call per batch in order, each result labelled
//!      `Batch N (files: ...)`, then a single merge call over all sections;
//!      the merged text leads the report and the labelled sections follow it
//!      under [`BATCH_DETAILS_HEADING`];
//!   3) line mode  → one call per parsed file, output decoded into findings.
//!
//! Completion failures never abort a run: a failed batch becomes a
//! `batch failed: <reason>` section, a failed merge falls back to the
//! concatenated sections, a failed file in line mode is skipped.

pub mod findings;
pub mod prompt;

use std::time::Instant;

use ai_llm_service::{CompletionFailure, CompletionService};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::budget::ReviewBatch;
use crate::parser::ParsedFileChange;
use findings::{LineFinding, parse_findings};
use prompt::ReviewPrompts;

/// Report text when nothing was eligible for review.
pub const NO_CHANGES_REPORT: &str = "No reviewable changes.";

/// Heading of the per-batch sections appended after a merged report.
pub const BATCH_DETAILS_HEADING: &str = "# Batch reviews";

lazy_static! {
    static ref TOTAL_SCORE: Regex =
        Regex::new(r"(?i)total\s+score\s*[:：]\s*(\d+)").expect("score regex");
}

#[derive(Debug, Clone, Default)]
pub struct ReviewOrchestrator {
    prompts: ReviewPrompts,
}

impl ReviewOrchestrator {
    pub fn new(prompts: ReviewPrompts) -> Self {
        Self { prompts }
    }

    /// Reviews batches strictly in order and returns one Markdown report.
    pub async fn review<C: CompletionService>(
        &self,
        batches: &[ReviewBatch],
        commit_summary: &str,
        completion: &C,
    ) -> String {
        let t0 = Instant::now();
        match batches {
            [] => {
                debug!("review: no batches");
                NO_CHANGES_REPORT.to_string()
            }
            [single] => {
                let (sys, user) = self.prompts.batch_review(&single.text, commit_summary);
                let report = match completion.complete(&user, &sys).await {
                    Ok(text) => strip_fence(&text),
                    Err(f) => {
                        warn!(category = %f.category, "review: single batch failed");
                        failure_marker(&f)
                    }
                };
                info!("review: single batch done in {} ms", t0.elapsed().as_millis());
                report
            }
            many => {
                let mut sections = Vec::with_capacity(many.len());
                let mut failed = 0usize;
                for batch in many {
                    let (sys, user) = self.prompts.batch_review(&batch.text, commit_summary);
                    let body = match completion.complete(&user, &sys).await {
                        Ok(text) => strip_fence(&text),
                        Err(f) => {
                            failed += 1;
                            warn!(category = %f.category, batch = batch.index + 1, "review: batch failed");
                            failure_marker(&f)
                        }
                    };
                    debug!("review: {} done", batch.label());
                    sections.push(format!("## {}\n\n{}", batch.label(), body));
                }
                let joined = sections.join("\n\n");

                let (sys, user) = self.prompts.merge(&joined, commit_summary);
                let report = match completion.complete(&user, &sys).await {
                    Ok(text) => format!("{}\n\n---\n{BATCH_DETAILS_HEADING}\n\n{joined}", strip_fence(&text)),
                    Err(f) => {
                        warn!(category = %f.category, "review: merge failed, returning sections");
                        format!("{joined}\n\n---\nmerge failed: {f}")
                    }
                };
                info!(
                    "review: {} batches ({} failed) merged in {} ms",
                    many.len(),
                    failed,
                    t0.elapsed().as_millis()
                );
                report
            }
        }
    }

    /// Line-level review: one completion call per file with changed lines.
    pub async fn review_lines<C: CompletionService>(
        &self,
        files: &[ParsedFileChange],
        completion: &C,
    ) -> Vec<LineFinding> {
        let mut all = Vec::new();
        for file in files {
            if file.lines_changed == 0 {
                debug!("review: no changed lines in {}", file.path);
                continue;
            }
            let input = json!({
                "file_meta": {
                    "path": file.path,
                    "old_path": file.old_path,
                    "lines_changed": file.lines_changed,
                    "context": file.context,
                },
                "changes": file.changes,
            });
            let input = match serde_json::to_string_pretty(&input) {
                Ok(s) => s,
                Err(e) => {
                    warn!("review: cannot serialize {}: {}", file.path, e);
                    continue;
                }
            };

            let (sys, user) = self.prompts.line_review(&input);
            let output = match completion.complete(&user, &sys).await {
                Ok(text) => text,
                Err(f) => {
                    warn!(category = %f.category, "review: line review failed for {}", file.path);
                    continue;
                }
            };
            match parse_findings(&output, &file.path) {
                Ok(found) => {
                    debug!("review: {} findings for {}", found.len(), file.path);
                    all.extend(found);
                }
                Err(e) => warn!("review: unusable findings for {}: {}", file.path, e),
            }
        }
        all
    }
}

fn failure_marker(f: &CompletionFailure) -> String {
    format!("batch failed: {f}")
}

/// Removes a surrounding Markdown fence (```` ```markdown ````, ```` ```md ````
/// or bare ```` ``` ````); any other text is only trimmed.
pub fn strip_fence(text: &str) -> String {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t.to_string();
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return t.to_string();
    };
    let (tag, body) = inner.split_once('\n').unwrap_or((inner, ""));
    match tag.trim() {
        "" | "markdown" | "md" => body.trim().to_string(),
        _ => t.to_string(),
    }
}

/// `N` of a `Total score: N` line; 0 when absent.
pub fn parse_review_score(report: &str) -> u32 {
    TOTAL_SCORE
        .captures(report)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use ai_llm_service::FailureCategory;
    use std::sync::Mutex;

    /// Scripted completion: records calls, fails for prompts mentioning
    /// `fail_on`, answers merge calls with the merge prompt itself.
    struct FakeCompletion {
        calls: Mutex<Vec<(String, String)>>,
        fail_on: Option<&'static str>,
        reply: fn(&str) -> String,
    }

    impl FakeCompletion {
        fn new(reply: fn(&str) -> String) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: None,
                reply,
            }
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }

        fn merge_calls(&self) -> usize {
            self.calls()
                .iter()
                .filter(|(_, sys)| sys.starts_with("You merge"))
                .count()
        }
    }

    impl CompletionService for FakeCompletion {
        async fn complete(&self, prompt: &str, auxiliary: &str) -> Result<String, CompletionFailure> {
            self.calls
                .lock()
                .unwrap()
                .push((prompt.to_string(), auxiliary.to_string()));
            let is_merge = auxiliary.starts_with("You merge");
            if self.fail_on.is_some_and(|needle| prompt.contains(needle)) && !is_merge {
                return Err(CompletionFailure::new(FailureCategory::Timeout, "deadline exceeded"));
            }
            Ok((self.reply)(prompt))
        }
    }

    fn batch(index: usize, path: &str) -> ReviewBatch {
        ReviewBatch {
            index,
            files: vec![path.to_string()],
            text: format!("[{{\"new_path\": \"{path}\"}}]"),
            truncated: false,
        }
    }

    #[tokio::test]
    async fn single_batch_returns_unfenced_output() {
        let fake = FakeCompletion::new(|p| format!("```markdown\n{p}\n```"));
        let orch = ReviewOrchestrator::default();
        let report = orch.review(&[batch(0, "a.py")], "feat: a", &fake).await;

        let calls = fake.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(report, calls[0].0.trim());
        assert!(report.contains("feat: a"));
    }

    #[tokio::test]
    async fn failed_batch_is_marked_and_merge_runs_once() {
        let mut fake = FakeCompletion::new(|p| {
            if p.starts_with("# Partial reviews") {
                "Merged: overall fine.\n\nTotal score: 80".to_string()
            } else {
                "looks fine".to_string()
            }
        });
        fake.fail_on = Some("file1.py");
        let batches = vec![batch(0, "file0.py"), batch(1, "file1.py"), batch(2, "file2.py")];

        let report = ReviewOrchestrator::default()
            .review(&batches, "", &fake)
            .await;

        assert_eq!(fake.calls().len(), 4);
        assert_eq!(fake.merge_calls(), 1);
        assert_eq!(report.matches("looks fine").count(), 2);
        assert_eq!(report.matches("batch failed: timeout: deadline exceeded").count(), 1);
        assert!(report.contains("## Batch 1 (files: file0.py)"));
        assert!(report.contains("## Batch 3 (files: file2.py)"));
        assert!(report.starts_with("Merged: overall fine."));
        assert_eq!(parse_review_score(&report), 80);
    }

    #[tokio::test]
    async fn merge_failure_keeps_sections() {
        struct MergeFails;
        impl CompletionService for MergeFails {
            async fn complete(&self, _p: &str, aux: &str) -> Result<String, CompletionFailure> {
                if aux.starts_with("You merge") {
                    Err(CompletionFailure::new(FailureCategory::RateLimited, "slow down"))
                } else {
                    Ok("```\nok\n```".into())
                }
            }
        }
        let report = ReviewOrchestrator::default()
            .review(&[batch(0, "a.py"), batch(1, "b.py")], "", &MergeFails)
            .await;
        assert!(report.starts_with("## Batch 1 (files: a.py)\n\nok"));
        assert!(report.ends_with("merge failed: rate limited: slow down"));
    }

    #[tokio::test]
    async fn no_batches_means_no_calls() {
        let fake = FakeCompletion::new(|p| p.to_string());
        let report = ReviewOrchestrator::default().review(&[], "", &fake).await;
        assert_eq!(report, NO_CHANGES_REPORT);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn line_review_collects_findings_per_file() {
        let fake = FakeCompletion::new(|p| {
            if p.contains("\"path\": \"a.py\"") {
                r#"[{"file": "a.py", "line_number": 2, "comment": "typo", "severity": "info"}]"#
                    .to_string()
            } else {
                "not json".to_string()
            }
        });
        let files = vec![
            parser::parse("@@ -1,1 +1,2 @@\n x\n+y\n", "a.py", None),
            parser::parse("@@ -1 +1 @@\n-q\n+r\n", "b.py", None),
            parser::parse("", "c.py", None),
        ];
        let found = ReviewOrchestrator::default()
            .review_lines(&files, &fake)
            .await;
        assert_eq!(fake.calls().len(), 2);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line_number, Some(2));
    }

    #[test]
    fn fence_variants() {
        assert_eq!(strip_fence("```markdown\n# Title\n```"), "# Title");
        assert_eq!(strip_fence("  ```md\nbody\n```  "), "body");
        assert_eq!(strip_fence("```\nbody\n```"), "body");
        assert_eq!(strip_fence("```python\nx = 1\n```"), "```python\nx = 1\n```");
        assert_eq!(strip_fence("plain text"), "plain text");
        assert_eq!(strip_fence("```markdown\nunterminated"), "```markdown\nunterminated");
    }

    #[test]
    fn score_extraction() {
        assert_eq!(parse_review_score("...\nTotal score: 87\n"), 87);
        assert_eq!(parse_review_score("**total score**"), 0);
        assert_eq!(parse_review_score("TOTAL SCORE：92 points"), 92);
        assert_eq!(parse_review_score(""), 0);
    }
}
