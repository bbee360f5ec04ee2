//! HTTP providers behind [`crate::completion::LlmClient`].
//!
//! Both providers answer one `(prompt, system)` pair per request; the
//! plumbing they share (endpoint check, client setup, JSON round trip with
//! status mapping) lives here.

pub mod ollama_service;
pub mod open_ai_service;

use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
use crate::error_handler::{AiLlmError, HttpError, ProviderError, ProviderErrorKind, make_snippet};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Trimmed endpoint, or `InvalidEndpoint` unless it is an http(s) URL.
fn checked_endpoint(provider: LlmProvider, endpoint: &str) -> Result<&str, AiLlmError> {
    let e = endpoint.trim();
    if e.starts_with("http://") || e.starts_with("https://") {
        Ok(e.trim_end_matches('/'))
    } else {
        Err(ProviderError::new(provider, ProviderErrorKind::InvalidEndpoint(endpoint.to_string())).into())
    }
}

fn http_client(cfg: &LlmModelConfig, headers: HeaderMap) -> Result<reqwest::Client, AiLlmError> {
    let timeout = Duration::from_secs(cfg.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()?)
}

/// POSTs `body` and decodes the answer; non-2xx becomes `HttpStatus` with a
/// body snippet, an undecodable answer becomes `Decode`.
async fn post_json<B, R>(
    client: &reqwest::Client,
    provider: LlmProvider,
    url: &str,
    body: &B,
) -> Result<R, AiLlmError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let started = Instant::now();
    let resp = client.post(url).json(body).send().await?;

    let status = resp.status();
    if !status.is_success() {
        let snippet = make_snippet(&resp.text().await.unwrap_or_default());
        warn!(provider = provider.as_str(), %status, %snippet, "{} rejected the request", url);
        return Err(ProviderError::new(
            provider,
            ProviderErrorKind::HttpStatus(HttpError {
                status,
                url: url.to_string(),
                snippet,
            }),
        )
        .into());
    }

    let out = resp
        .json::<R>()
        .await
        .map_err(|e| ProviderError::new(provider, ProviderErrorKind::Decode(e.to_string())))?;
    debug!(
        provider = provider.as_str(),
        latency_ms = started.elapsed().as_millis(),
        "{} answered",
        url
    );
    Ok(out)
}
