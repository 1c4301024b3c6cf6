//! Text generation backends for the recap narrative.

use crate::config::GenerationConfig;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("text generation is not configured (missing API key)")]
    Unavailable,

    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected generation response: {0}")]
    Response(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f64,
    pub max_output_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 1500,
        }
    }
}

impl From<&GenerationConfig> for GenerationOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// Trait for text generation backends.
pub trait TextGenerator: Send + Sync {
    /// Whether `generate` can be attempted at all.
    fn is_available(&self) -> bool;

    fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, GenerationError>;
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiCompatibleGenerator {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleGenerator {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Build from config, reading the key from `config.api_key_env`.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, GenerationError> {
        Self::new(
            config.base_url.as_str(),
            config.model.as_str(),
            std::env::var(&config.api_key_env).ok(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, prompt: &str, options: &GenerationOptions) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": options.temperature,
            "max_tokens": options.max_output_tokens,
        })
    }
}

impl TextGenerator for OpenAiCompatibleGenerator {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, GenerationError> {
        let key = self.api_key.as_deref().ok_or(GenerationError::Unavailable)?;
        debug!("[generation] model {} at {}", self.model, self.endpoint());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(key)
            .json(&self.request_body(prompt, options))
            .send()
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let body: Value = response
            .json()
            .map_err(|e| GenerationError::Response(e.to_string()))?;
        extract_message(&body)
    }
}

/// First choice's message content.
fn extract_message(body: &Value) -> Result<String, GenerationError> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| GenerationError::Response("no message content in first choice".into()))
}
