use apiary_core::{ApiaryError, ApiaryResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::ReasoningBackend;

/// Configuration for the HTTP reasoning backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Base URL of the reasoning service.
    pub base_url: String,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Model identifier forwarded to the service.
    pub model_id: String,
    /// Upper bound on generated tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f64 {
    0.2
}

/// Reasoning backend speaking a plain `POST {base_url}/v1/generate` protocol.
///
/// The response body is expected to be `{"text": "..."}`; anything else is a
/// reasoning error for the caller's fallback path to absorb.
pub struct HttpReasoningBackend {
    config: ReasoningConfig,
    http: reqwest::Client,
}

impl HttpReasoningBackend {
    /// Creates a backend from the given config.
    pub fn new(config: ReasoningConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ReasoningBackend for HttpReasoningBackend {
    async fn generate(&self, prompt: &str) -> ApiaryResult<String> {
        let url = format!("{}/v1/generate", self.config.base_url);

        let body = serde_json::json!({
            "model": self.config.model_id,
            "prompt": prompt,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiaryError::Reasoning(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ApiaryError::Reasoning(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiaryError::Reasoning(format!(
                "reasoning service error {status}: {resp_body}"
            )));
        }

        resp_body["text"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| {
                ApiaryError::Reasoning("missing text field in reasoning response".to_string())
            })
    }
}
