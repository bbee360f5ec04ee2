//! Chat completions for OpenAI and DeepSeek (`POST {endpoint}/v1/chat/completions`).

use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{checked_endpoint, http_client, post_json};
use crate::config::llm_model_config::LlmModelConfig;
use crate::error_handler::{AiLlmError, ProviderError, ProviderErrorKind};

#[derive(Debug)]
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
}

impl OpenAiService {
    /// Needs an OpenAI-compatible provider, a non-blank key and an http(s)
    /// endpoint.
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        let provider = cfg.provider;
        if !provider.is_openai_compatible() {
            return Err(ProviderError::new(provider, ProviderErrorKind::InvalidProvider).into());
        }
        let api_key = cfg
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::new(provider, ProviderErrorKind::MissingApiKey))?;
        let url_chat = chat_url(checked_endpoint(provider, &cfg.endpoint)?);

        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
            ProviderError::new(provider, ProviderErrorKind::Decode(format!("api key header: {e}")))
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, bearer);
        let client = http_client(&cfg, headers)?;

        info!(provider = provider.as_str(), model = %cfg.model, "chat client ready: {}", url_chat);
        Ok(Self {
            client,
            cfg,
            url_chat,
        })
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    /// One non-streaming chat turn: the system message (if any), then `prompt`.
    pub async fn complete(&self, prompt: &str, system: &str) -> Result<String, AiLlmError> {
        let body = ChatRequest::new(&self.cfg, prompt, system);
        let out: ChatResponse = post_json(&self.client, self.cfg.provider, &self.url_chat, &body).await?;
        first_content(out)
            .ok_or_else(|| ProviderError::new(self.cfg.provider, ProviderErrorKind::EmptyChoices).into())
    }
}

/// `https://api.openai.com` and `https://api.openai.com/v1` both resolve to
/// `.../v1/chat/completions`.
fn chat_url(base: &str) -> String {
    let base = base.strip_suffix("/v1").unwrap_or(base);
    format!("{base}/v1/chat/completions")
}

fn first_content(out: ChatResponse) -> Option<String> {
    out.choices
        .into_iter()
        .find_map(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> ChatRequest<'a> {
    fn new(cfg: &'a LlmModelConfig, prompt: &'a str, system: &'a str) -> Self {
        let system = Some(system)
            .filter(|s| !s.trim().is_empty())
            .map(|content| Message {
                role: "system",
                content,
            });
        let user = Message {
            role: "user",
            content: prompt,
        };
        Self {
            model: &cfg.model,
            messages: system.into_iter().chain([user]).collect(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
