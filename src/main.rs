mod telemetry;

use std::sync::Arc;

use ai_llm_service::LlmClient;
use anyhow::{Context, bail};
use mr_reviewer::git_providers::ChangeRequestId;
use mr_reviewer::{
    GitLabClient, GitLabPublisher, QueueConfig, ReviewQueue, ReviewerConfig,
    ReviewerProviderConfig, run_review,
};
use tracing::{error, info, warn};

/// Everything a worker needs for one review; shared read-only.
struct App {
    cfg: ReviewerConfig,
    gitlab: GitLabClient,
    publisher: GitLabPublisher,
    llm: LlmClient,
}

async fn handle(app: Arc<App>, id: ChangeRequestId) {
    let outcome = run_review(
        &app.cfg,
        &id,
        &app.gitlab,
        &app.llm,
        &app.gitlab,
        &app.publisher,
    )
    .await;

    match outcome {
        Ok(Some(out)) => {
            if let Some(lines) = out.line_review.as_ref().filter(|l| !l.is_complete()) {
                warn!(
                    "{}: only {}/{} line comments submitted",
                    id, lines.success_count, lines.total
                );
            }
            match app.publisher.post_note(&id, &out.report).await {
                Ok(()) => info!(
                    "{}: review posted (score={}, files={}, +{} -{})",
                    id, out.score, out.totals.files, out.totals.additions, out.totals.deletions
                ),
                Err(e) => error!("{}: cannot post review note: {}", id, e),
            }
        }
        Ok(None) => info!("{}: no reviewable changes", id),
        Err(e) => error!("{}: review failed: {}", id, e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine: variables may come from the environment.
    let dotenv = dotenvy::dotenv();
    telemetry::init()?;
    if let Err(e) = dotenv {
        info!("no .env loaded: {}", e);
    }

    let ids = std::env::args()
        .skip(1)
        .map(|arg| arg.parse::<ChangeRequestId>())
        .collect::<Result<Vec<_>, _>>()
        .context("usage: mr-review-backend <group/project!iid>...")?;
    if ids.is_empty() {
        bail!("usage: mr-review-backend <group/project!iid>...");
    }

    let cfg = ReviewerConfig::from_env().context("review config")?;
    let provider = ReviewerProviderConfig::from_env().context("gitlab config")?;
    let queue_cfg = QueueConfig::from_env().context("queue config")?;
    let llm = LlmClient::from_env().context("llm config")?;

    if !llm.ping().await {
        warn!("llm {} did not answer the ping; reviews may fail", llm.model());
    }

    let app = Arc::new(App {
        cfg,
        gitlab: GitLabClient::from_config(&provider)?,
        publisher: GitLabPublisher::from_config(&provider)?,
        llm,
    });

    let shared = Arc::clone(&app);
    let queue = ReviewQueue::start(queue_cfg, move |id: ChangeRequestId| {
        handle(Arc::clone(&shared), id)
    });

    for id in ids {
        info!("queued review for {}", id);
        queue.submit(id).await?;
    }
    queue.shutdown().await;
    Ok(())
}
