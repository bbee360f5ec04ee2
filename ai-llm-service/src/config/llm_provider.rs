use std::str::FromStr;

use crate::error_handler::{AiLlmError, ConfigError};

/// Represents the provider (backend) used for text completion.
///
/// DeepSeek exposes an OpenAI-compatible chat API, so it is served by the same
/// HTTP client as OpenAI but keeps its own defaults (endpoint, model, key var).
///
/// # Examples
///
/// ```
/// use ai_llm_service::LlmProvider;
///
/// let p: LlmProvider = "deepseek".parse().unwrap();
/// assert!(p.is_openai_compatible());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Local Ollama runtime.
    Ollama,
    /// OpenAI chat completions API.
    OpenAi,
    /// DeepSeek (OpenAI-compatible chat API).
    DeepSeek,
}

impl LlmProvider {
    /// `true` for providers that speak the `/v1/chat/completions` protocol.
    pub fn is_openai_compatible(self) -> bool {
        matches!(self, LlmProvider::OpenAi | LlmProvider::DeepSeek)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LlmProvider::Ollama => "ollama",
            LlmProvider::OpenAi => "openai",
            LlmProvider::DeepSeek => "deepseek",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = AiLlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(LlmProvider::Ollama),
            "openai" | "chatgpt" => Ok(LlmProvider::OpenAi),
            "deepseek" => Ok(LlmProvider::DeepSeek),
            other => Err(ConfigError::UnsupportedProvider(other.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_providers_case_insensitively() {
        assert_eq!("Ollama".parse::<LlmProvider>().unwrap(), LlmProvider::Ollama);
        assert_eq!(" openai ".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAi);
        assert_eq!("DEEPSEEK".parse::<LlmProvider>().unwrap(), LlmProvider::DeepSeek);
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = "zhipuai".parse::<LlmProvider>().unwrap_err();
        assert!(err.to_string().contains("unsupported provider: zhipuai"));
    }
}
