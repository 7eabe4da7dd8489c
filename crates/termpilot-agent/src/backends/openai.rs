use super::CompletionBackend;
use crate::config::{LlmProvider, ModelConfig};
use async_trait::async_trait;
use termpilot_core::{TermError, TermResult};

/// OpenAI chat-completions backend.
///
/// Also serves OpenRouter and Groq, which expose the same API.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request.header("X-Title", "termpilot")
        } else {
            request
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(&self, system_prompt: &str, user_message: &str) -> TermResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_message },
            ],
        });

        let resp = self
            .add_provider_headers(self.http.post(&url))
            .timeout(self.config.timeout())
            .json(&body)
            .send()
            .await
            .map_err(|e| TermError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| TermError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(TermError::Http(format!(
                "OpenAI API error {status}: {resp_body}"
            )));
        }

        parse_openai_response(&resp_body)
    }
}

/// Extract `choices[0].message.content`.
pub fn parse_openai_response(body: &serde_json::Value) -> TermResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| TermError::Resolver(format!("no completion content in response: {body}")))
}
