use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{InferenceBackend, InferenceError};
use crate::config::InferenceConfig;
use crate::sanitize::sanitize_for_prompt;

/// Ollama HTTP client for local LLM inference.
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InferenceError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn from_config(config: &InferenceConfig) -> Result<Self, InferenceError> {
        Self::new(&config.endpoint, &config.model, config.timeout_secs)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl InferenceBackend for OllamaClient {
    async fn infer(&self, prompt: &str) -> Result<String, InferenceError> {
        let url = format!("{}/api/generate", self.base_url);
        let prompt = sanitize_for_prompt(prompt);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    InferenceError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    InferenceError::Timeout(self.timeout_secs)
                } else {
                    InferenceError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;

        tracing::debug!(
            model = %self.model,
            response_chars = parsed.response.chars().count(),
            "Inference completed"
        );

        Ok(parsed.response)
    }
}
