//! Completion configs loaded from environment variables.
//!
//! The provider is chosen by `LLM_PROVIDER` (`openai` | `deepseek` | `ollama`,
//! default `openai`); each provider then reads its own variables.
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_PROVIDER`     = provider kind
//! - `LLM_MAX_TOKENS`   = optional max tokens to generate (u32)
//! - `LLM_TIMEOUT_SECS` = optional request timeout (u64, default 600)
//!
//! OpenAI:
//! - `OPENAI_API_KEY` (mandatory), `OPENAI_API_BASE_URL`, `OPENAI_API_MODEL`
//!
//! DeepSeek:
//! - `DEEPSEEK_API_KEY` (mandatory), `DEEPSEEK_API_BASE_URL`, `DEEPSEEK_API_MODEL`
//!
//! Ollama:
//! - `OLLAMA_API_BASE_URL`, `OLLAMA_API_MODEL`

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{AiLlmError, env_opt_u32, env_opt_u64, env_or, must_env},
};

const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Builds the config for whichever provider `LLM_PROVIDER` selects.
///
/// # Errors
/// - `ConfigError::UnsupportedProvider` for an unknown provider name
/// - `ConfigError::MissingVar` when a mandatory key is absent
/// - validation errors from [`LlmModelConfig::validate`]
pub fn config_from_env() -> Result<LlmModelConfig, AiLlmError> {
    let provider: LlmProvider = env_or("LLM_PROVIDER", "openai").parse()?;
    let cfg = match provider {
        LlmProvider::OpenAi => config_openai()?,
        LlmProvider::DeepSeek => config_deepseek()?,
        LlmProvider::Ollama => config_ollama()?,
    };
    cfg.validate()?;
    Ok(cfg)
}

/// OpenAI chat completions.
///
/// # Defaults
/// - endpoint `https://api.openai.com`, model `gpt-4o-mini`
/// - `temperature = Some(0.2)`
pub fn config_openai() -> Result<LlmModelConfig, AiLlmError> {
    Ok(LlmModelConfig {
        provider: LlmProvider::OpenAi,
        model: env_or("OPENAI_API_MODEL", "gpt-4o-mini"),
        endpoint: env_or("OPENAI_API_BASE_URL", "https://api.openai.com"),
        api_key: Some(must_env("OPENAI_API_KEY")?),
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: Some(0.2),
        timeout_secs: Some(timeout_secs()?),
    })
}

/// DeepSeek through its OpenAI-compatible API.
///
/// # Defaults
/// - endpoint `https://api.deepseek.com`, model `deepseek-chat`
pub fn config_deepseek() -> Result<LlmModelConfig, AiLlmError> {
    Ok(LlmModelConfig {
        provider: LlmProvider::DeepSeek,
        model: env_or("DEEPSEEK_API_MODEL", "deepseek-chat"),
        endpoint: env_or("DEEPSEEK_API_BASE_URL", "https://api.deepseek.com"),
        api_key: Some(must_env("DEEPSEEK_API_KEY")?),
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: Some(0.2),
        timeout_secs: Some(timeout_secs()?),
    })
}

/// Local Ollama runtime.
///
/// # Defaults
/// - endpoint `http://127.0.0.1:11434`, model `deepseek-r1-8k:14b`
/// - no API key
pub fn config_ollama() -> Result<LlmModelConfig, AiLlmError> {
    Ok(LlmModelConfig {
        provider: LlmProvider::Ollama,
        model: env_or("OLLAMA_API_MODEL", "deepseek-r1-8k:14b"),
        endpoint: env_or("OLLAMA_API_BASE_URL", "http://127.0.0.1:11434"),
        api_key: None,
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: Some(0.2),
        timeout_secs: Some(timeout_secs()?),
    })
}

fn timeout_secs() -> Result<u64, AiLlmError> {
    Ok(env_opt_u64("LLM_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS))
}
