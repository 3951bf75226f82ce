use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{LlmConfig, LlmProviderType};
use crate::error::OkrError;

use super::provider::{LlmProvider, LlmProviderInfo};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:11434/v1";
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Provider for any OpenAI-compatible chat-completions endpoint
/// (OpenAI, OpenRouter, local Ollama).
pub struct OpenAiLlmProvider {
    config: LlmConfig,
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl OpenAiLlmProvider {
    pub fn new(config: LlmConfig) -> Result<Self, OkrError> {
        if config.provider_type == LlmProviderType::OpenAi && config.api_key.is_none() {
            return Err(OkrError::Generic(
                "openai provider requires an api key".to_string(),
            ));
        }

        let timeout = config.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| OkrError::Generic(format!("failed to build http client: {}", e)))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| match config.provider_type {
                LlmProviderType::Local => DEFAULT_LOCAL_BASE_URL.to_string(),
                _ => DEFAULT_OPENAI_BASE_URL.to_string(),
            });

        Ok(Self {
            config,
            client,
            base_url,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiLlmProvider {
    async fn complete(&self, prompt: &str) -> Result<String, OkrError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OkrError::ModelUnavailable(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(OkrError::ModelUnavailable(format!(
                "model endpoint returned {}: {}",
                status, detail
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            OkrError::ModelUnavailable(format!("failed to decode model response: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| OkrError::ModelUnavailable("model response had no choices".to_string()))
    }

    fn info(&self) -> LlmProviderInfo {
        LlmProviderInfo {
            name: match self.config.provider_type {
                LlmProviderType::Local => "local".to_string(),
                _ => "openai".to_string(),
            },
            model: self.config.model.clone(),
        }
    }
}
