//! Completion service used by the review pipeline.
//!
//! The pipeline only depends on the [`completion::CompletionService`] capability.
//! Concrete providers (Ollama, OpenAI-compatible APIs) live under [`services`]
//! and are selected at the edge by [`completion::LlmClient::from_config`].

pub mod completion;
pub mod config;
pub mod error_handler;
pub mod services;

pub use completion::{CompletionFailure, CompletionService, FailureCategory, LlmClient};
pub use config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
pub use error_handler::AiLlmError;
