pub mod ollama;
pub mod openai;

pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

use crate::config::{LlmProvider, ModelConfig};
use async_trait::async_trait;
use std::sync::Arc;
use termpilot_core::TermResult;

/// A text-completion service: one system prompt plus one user message in,
/// the assistant's reply text out.
///
/// To add a provider, implement this trait in a new module under `backends/`,
/// add a variant to [`LlmProvider`], and map it in [`backend_for`].
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    async fn complete(&self, system_prompt: &str, user_message: &str) -> TermResult<String>;
}

/// The backend for `config`, or `None` when the provider is disabled.
pub fn backend_for(config: &ModelConfig) -> Option<Arc<dyn CompletionBackend>> {
    match config.provider {
        LlmProvider::OpenAi | LlmProvider::OpenRouter | LlmProvider::Groq => {
            Some(Arc::new(OpenAiBackend::new(config.clone())))
        }
        LlmProvider::Ollama => Some(Arc::new(OllamaBackend::new(config.clone()))),
        LlmProvider::Disabled => None,
    }
}
