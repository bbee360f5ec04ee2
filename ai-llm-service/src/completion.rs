//! The completion capability consumed by the review pipeline.
//!
//! - [`CompletionService`] is the only thing the pipeline depends on.
//! - [`LlmClient`] is the enum-dispatched production implementation, one
//!   variant per provider protocol, built by [`LlmClient::from_config`].
//! - Provider errors never leave this module as-is: they are folded into a
//!   [`CompletionFailure`] carrying a coarse [`FailureCategory`] for logging and
//!   a human-readable message the caller may embed in a report.

use std::fmt;
use std::future::Future;

use tracing::{debug, warn};

use crate::config::llm_model_config::LlmModelConfig;
use crate::error_handler::{AiLlmError, ProviderErrorKind};
use crate::services::{ollama_service::OllamaService, open_ai_service::OpenAiService};

/// Text completion: `(prompt, auxiliary) -> text`.
///
/// `auxiliary` is the instruction that frames the prompt (sent as the system
/// message by chat providers). Implementations must not panic on provider
/// failures; they return a [`CompletionFailure`] instead.
pub trait CompletionService: Send + Sync {
    fn complete(
        &self,
        prompt: &str,
        auxiliary: &str,
    ) -> impl Future<Output = Result<String, CompletionFailure>> + Send;
}

/// Coarse failure classes, used for logging and for the text shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Timeout,
    RateLimited,
    Unauthorized,
    HttpStatus(u16),
    Transport,
    Decode,
    EmptyResponse,
    Config,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCategory::Timeout => f.write_str("timeout"),
            FailureCategory::RateLimited => f.write_str("rate limited"),
            FailureCategory::Unauthorized => f.write_str("unauthorized"),
            FailureCategory::HttpStatus(code) => write!(f, "http {code}"),
            FailureCategory::Transport => f.write_str("transport"),
            FailureCategory::Decode => f.write_str("decode"),
            FailureCategory::EmptyResponse => f.write_str("empty response"),
            FailureCategory::Config => f.write_str("configuration"),
        }
    }
}

/// Tagged completion failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionFailure {
    pub category: FailureCategory,
    pub message: String,
}

impl CompletionFailure {
    pub fn new(category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompletionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

impl std::error::Error for CompletionFailure {}

impl From<AiLlmError> for CompletionFailure {
    fn from(e: AiLlmError) -> Self {
        let message = e.to_string();
        let category = match &e {
            AiLlmError::HttpTransport(re) if re.is_timeout() => FailureCategory::Timeout,
            AiLlmError::HttpTransport(_) => FailureCategory::Transport,
            AiLlmError::Config(_) => FailureCategory::Config,
            AiLlmError::Provider(pe) => match &pe.kind {
                ProviderErrorKind::HttpStatus(h) => match h.status.as_u16() {
                    401 | 403 => FailureCategory::Unauthorized,
                    429 => FailureCategory::RateLimited,
                    408 | 504 => FailureCategory::Timeout,
                    code => FailureCategory::HttpStatus(code),
                },
                ProviderErrorKind::Decode(_) => FailureCategory::Decode,
                ProviderErrorKind::EmptyChoices => FailureCategory::EmptyResponse,
                _ => FailureCategory::Config,
            },
        };
        Self { category, message }
    }
}

/// Production completion client (enum-dispatch, no trait objects).
#[derive(Debug)]
pub enum LlmClient {
    Ollama(OllamaService),
    OpenAi(OpenAiService),
}

impl LlmClient {
    /// Picks the provider implementation for `cfg.provider`.
    ///
    /// # Errors
    /// Validation and construction errors of the selected service.
    pub fn from_config(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        cfg.validate()?;
        if cfg.provider.is_openai_compatible() {
            Ok(Self::OpenAi(OpenAiService::new(cfg)?))
        } else {
            Ok(Self::Ollama(OllamaService::new(cfg)?))
        }
    }

    /// Convenience: build from `LLM_PROVIDER` and friends.
    pub fn from_env() -> Result<Self, AiLlmError> {
        let cfg = crate::config::default_config::config_from_env()?;
        Self::from_config(cfg)
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Ollama(s) => s.model(),
            Self::OpenAi(s) => s.model(),
        }
    }

    async fn generate(&self, prompt: &str, system: &str) -> Result<String, AiLlmError> {
        match self {
            Self::Ollama(s) => s.complete(prompt, system).await,
            Self::OpenAi(s) => s.complete(prompt, system).await,
        }
    }

    /// Connectivity probe: asks the model to answer `ok`.
    pub async fn ping(&self) -> bool {
        match self.generate("Reply with exactly: ok", "").await {
            Ok(text) => text.trim().trim_matches('"').eq_ignore_ascii_case("ok"),
            Err(e) => {
                warn!(error = %e, model = self.model(), "llm ping failed");
                false
            }
        }
    }
}

impl CompletionService for LlmClient {
    async fn complete(&self, prompt: &str, auxiliary: &str) -> Result<String, CompletionFailure> {
        match self.generate(prompt, auxiliary).await {
            Ok(text) => Ok(text),
            Err(e) => {
                let failure = CompletionFailure::from(e);
                debug!(category = %failure.category, "completion failed");
                Err(failure)
            }
        }
    }
}
