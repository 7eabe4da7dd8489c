use super::CompletionBackend;
use crate::config::ModelConfig;
use async_trait::async_trait;
use termpilot_core::{TermError, TermResult};

/// Local Ollama server, non-streaming `/api/chat`.
pub struct OllamaBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, system_prompt: &str, user_message: &str) -> TermResult<String> {
        let url = format!("{}/api/chat", self.config.base_url());
        let body = serde_json::json!({
            "model": self.config.model_id,
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "num_predict": self.config.max_tokens,
            },
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_message },
            ],
        });

        let resp = self
            .http
            .post(&url)
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
                "Ollama API error {status}: {resp_body}"
            )));
        }

        resp_body["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| TermError::Resolver(format!("no message content in response: {resp_body}")))
    }
}
