//! Local Ollama generation (`POST {endpoint}/api/generate`, `stream=false`).
//! The system instruction travels in Ollama's own `system` field.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{checked_endpoint, http_client, post_json};
use crate::config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
use crate::error_handler::{AiLlmError, ProviderError, ProviderErrorKind};

#[derive(Debug)]
pub struct OllamaService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_generate: String,
}

impl OllamaService {
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::Ollama {
            return Err(ProviderError::new(LlmProvider::Ollama, ProviderErrorKind::InvalidProvider).into());
        }
        let url_generate = format!("{}/api/generate", checked_endpoint(cfg.provider, &cfg.endpoint)?);
        let client = http_client(&cfg, HeaderMap::new())?;

        info!(model = %cfg.model, "ollama client ready: {}", url_generate);
        Ok(Self {
            client,
            cfg,
            url_generate,
        })
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    pub async fn complete(&self, prompt: &str, system: &str) -> Result<String, AiLlmError> {
        let body = GenerateRequest::new(&self.cfg, prompt, system);
        let out: GenerateResponse =
            post_json(&self.client, LlmProvider::Ollama, &self.url_generate, &body).await?;
        if out.response.trim().is_empty() {
            return Err(ProviderError::new(LlmProvider::Ollama, ProviderErrorKind::EmptyChoices).into());
        }
        Ok(out.response)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: Options,
}

impl<'a> GenerateRequest<'a> {
    fn new(cfg: &'a LlmModelConfig, prompt: &'a str, system: &'a str) -> Self {
        Self {
            model: &cfg.model,
            prompt,
            system: Some(system).filter(|s| !s.trim().is_empty()),
            stream: false,
            options: Options {
                temperature: cfg.temperature,
                num_predict: cfg.max_tokens,
            },
        }
    }
}

/// The `options` Ollama understands that the config can set.
#[derive(Debug, Serialize)]
struct Options {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(provider: LlmProvider, endpoint: &str) -> LlmModelConfig {
        LlmModelConfig {
            provider,
            model: "qwen3:14b".into(),
            endpoint: endpoint.into(),
            api_key: None,
            max_tokens: Some(128),
            temperature: Some(0.2),
            timeout_secs: Some(5),
        }
    }

    #[test]
    fn rejects_foreign_provider_and_bad_endpoint() {
        assert!(OllamaService::new(cfg(LlmProvider::OpenAi, "http://localhost:11434")).is_err());
        assert!(OllamaService::new(cfg(LlmProvider::Ollama, "localhost:11434")).is_err());
    }

    #[test]
    fn request_carries_system_and_options() {
        let c = cfg(LlmProvider::Ollama, "http://localhost:11434/");
        let v = serde_json::to_value(GenerateRequest::new(&c, "review this", "be strict")).unwrap();
        assert_eq!(v["system"], "be strict");
        assert_eq!(v["stream"], false);
        assert_eq!(v["options"]["num_predict"], 128);

        let v = serde_json::to_value(GenerateRequest::new(&c, "review this", "  ")).unwrap();
        assert!(v.get("system").is_none());
    }

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let svc = OllamaService::new(cfg(LlmProvider::Ollama, "http://localhost:11434/")).unwrap();
        assert_eq!(svc.url_generate, "http://localhost:11434/api/generate");
    }
}
