use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{Result, validate_http_endpoint};

/// Configuration for one completion backend.
///
/// # Fields
///
/// - `provider`: which backend to use (Ollama, OpenAI, DeepSeek).
/// - `model`: the model identifier (e.g., `"gpt-4o-mini"`, `"deepseek-chat"`).
/// - `endpoint`: base URL of the API (without the `/v1/...` or `/api/...` suffix).
/// - `api_key`: API key for providers that require authentication.
/// - `max_tokens`: maximum number of tokens to generate (if supported).
/// - `temperature`: sampling temperature.
/// - `timeout_secs`: request timeout in seconds.
///
/// # Examples
///
/// ```
/// use ai_llm_service::{LlmModelConfig, LlmProvider};
///
/// let cfg = LlmModelConfig {
///     provider: LlmProvider::OpenAi,
///     model: "gpt-4o-mini".to_string(),
///     endpoint: "https://api.openai.com".to_string(),
///     api_key: Some("sk-...".to_string()),
///     max_tokens: Some(2048),
///     temperature: Some(0.2),
///     timeout_secs: Some(120),
/// };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct LlmModelConfig {
    /// The completion provider/backend.
    pub provider: LlmProvider,

    /// Model identifier string.
    pub model: String,

    /// API base URL.
    pub endpoint: String,

    /// Optional API key for authentication.
    pub api_key: Option<String>,

    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Optional request timeout (in seconds).
    pub timeout_secs: Option<u64>,
}

impl LlmModelConfig {
    /// Checks the fields every provider relies on.
    ///
    /// # Errors
    /// - `ConfigError::EmptyModel` when the model name is blank
    /// - `ConfigError::InvalidFormat` when the endpoint lacks an http(s) scheme
    /// - `ConfigError::OutOfRange` when the temperature is outside `0.0..=2.0`
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(crate::error_handler::ConfigError::EmptyModel.into());
        }
        validate_http_endpoint("endpoint", self.endpoint.trim())?;
        if let Some(t) = self.temperature {
            crate::error_handler::validate_range_f32("temperature", t, 0.0, 2.0)?;
        }
        Ok(())
    }
}
