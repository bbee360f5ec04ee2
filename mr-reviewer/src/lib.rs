//! Public entry for the mr-reviewer pipeline.
//!
//! One high-level function reviews a merge request end to end:
//!
//! 1) **Step 1: Intake**
//!    - Fetch raw per-file diffs and commits from the [`DiffSource`]
//! 2) **Step 2: Filter**
//!    - Drop deleted / ignored / unsupported files, count `+`/`-` lines
//! 3) **Step 3: Batch**
//!    - Group eligible files and cap every batch text at the token budget
//! 4) **Step 4: Review**
//!    - One completion call per batch, plus a merge call for several batches
//! 5) **Step 5: Line review (optional)**
//!    - Parse diffs, ask for line findings, position and submit them
//!
//! The pipeline uses `tracing` for step logs and avoids `async-trait` and
//! heap trait objects (no `Box<dyn ...>`): collaborators are generic
//! parameters with plain `async fn` implementations.

pub mod budget;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod filter;
pub mod git_providers;
pub mod ignore;
pub mod parser;
pub mod publish;
pub mod review;

use std::time::Instant;

use ai_llm_service::CompletionService;
use tracing::{debug, info, warn};

use budget::TokenBudget;
use config::ReviewConfig;
use errors::MrResult;
use filter::{ChangeTotals, filter_changes};
use git_providers::{ChangeRequestId, CommentService, DiffSource, VersionService, commit_summary};
use publish::{LineAnchors, LinePositionMapper, SubmitSummary};
use review::{ReviewOrchestrator, parse_review_score, prompt::ReviewPrompts};

/// Result of one review run.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    /// Final Markdown report (fence stripped).
    pub report: String,
    /// `Total score: N` of the report, 0 when absent.
    pub score: u32,
    pub totals: ChangeTotals,
    /// Present when line review is enabled.
    pub line_review: Option<SubmitSummary>,
}

/// Runs steps **1–5** for a single merge request.
///
/// Returns `Ok(None)` when no change is eligible; the completion service is
/// not called in that case. Only the intake of changes can fail the run:
/// completion, version and comment failures end up inside the outcome.
///
/// # Logging
/// - `step1: fetched files=N commits=M`
/// - `step2: eligible=K (+A -D)`
/// - `step3: batches=B`
/// - `step4: report ready (score=S)`
/// - `step5: line review success/total`
pub async fn run_review<S, C, V, K>(
    cfg: &ReviewConfig,
    id: &ChangeRequestId,
    source: &S,
    completion: &C,
    versions: &V,
    sink: &K,
) -> MrResult<Option<ReviewOutcome>>
where
    S: DiffSource,
    C: CompletionService,
    V: VersionService,
    K: CommentService,
{
    // ---------------------------
    // Step 1: intake
    // ---------------------------
    let t0 = Instant::now();
    let raw = source.fetch_changes(id).await?;
    let commits = match source.fetch_commits(id).await {
        Ok(c) => c,
        Err(e) => {
            warn!("step1: commits unavailable for {}: {}", id, e);
            Vec::new()
        }
    };
    debug!(
        "step1: fetched files={} commits={} ({} ms)",
        raw.len(),
        commits.len(),
        t0.elapsed().as_millis()
    );

    // ---------------------------
    // Step 2: filter
    // ---------------------------
    let eligible = filter_changes(&raw, &cfg.allowed_extensions, cfg.ignore.as_ref());
    let totals = ChangeTotals::of(&eligible);
    debug!(
        "step2: eligible={} (+{} -{})",
        totals.files, totals.additions, totals.deletions
    );
    if eligible.is_empty() {
        info!("step2: nothing to review for {}", id);
        return Ok(None);
    }

    // ---------------------------
    // Step 3: batch
    // ---------------------------
    let batches = TokenBudget::new(cfg.max_tokens).split(&eligible, cfg.files_per_batch);
    debug!("step3: batches={}", batches.len());

    // ---------------------------
    // Step 4: review
    // ---------------------------
    let t4 = Instant::now();
    let orchestrator = ReviewOrchestrator::new(ReviewPrompts::new(cfg.review_style));
    let summary = commit_summary(&commits);
    let report = orchestrator.review(&batches, &summary, completion).await;
    let score = parse_review_score(&report);
    debug!(
        "step4: report ready (score={}) in {} ms",
        score,
        t4.elapsed().as_millis()
    );

    // ---------------------------
    // Step 5: line review
    // ---------------------------
    let line_review = if cfg.line_review_enabled {
        let parsed: Vec<_> = raw
            .iter()
            .filter(|r| eligible.iter().any(|e| e.new_path == r.new_path))
            .map(|r| {
                let old = r.renamed.then_some(r.old_path.as_str());
                parser::parse(&r.diff_text, &r.new_path, old)
            })
            .collect();
        let findings = orchestrator.review_lines(&parsed, completion).await;
        let mapper = LinePositionMapper::new().with_anchors(LineAnchors::from_parsed(&parsed));
        let submitted = mapper.map_and_submit(id, &findings, versions, sink).await;
        debug!(
            "step5: line review {}/{}",
            submitted.success_count, submitted.total
        );
        Some(submitted)
    } else {
        None
    };

    info!(
        "review done for {}: files={} score={} in {} ms",
        id,
        totals.files,
        score,
        t0.elapsed().as_millis()
    );
    Ok(Some(ReviewOutcome {
        report,
        score,
        totals,
        line_review,
    }))
}

// -----------------------------------------------------------------------------
// Convenience re-exports for downstream users
// -----------------------------------------------------------------------------

pub use config::ReviewConfig as ReviewerConfig;
pub use dispatch::{QueueConfig, ReviewQueue};
pub use git_providers::{ProviderConfig as ReviewerProviderConfig, gitlab::GitLabClient};
pub use publish::gitlab::GitLabPublisher;
