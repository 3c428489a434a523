//! Chat-completions generator

use crate::config::{OpenAiConfig, OpenAiConfigError};
use crate::wire::{ChatRequest, ChatResponse};
use async_trait::async_trait;
use ra_core::{GenerationError, Generator};
use std::time::Duration;

const MAX_ERROR_BODY: usize = 500;

/// Generator backed by an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    config: OpenAiConfig,
    url: String,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    /// Create generator; one HTTP client is reused for every call
    ///
    /// # Errors
    /// Returns [`OpenAiConfigError`] if the config is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: OpenAiConfig) -> Result<Self, OpenAiConfigError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OpenAiConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            url: config.completions_url(),
            config,
            client,
        })
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn request_failed(&self, err: &reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout {
                secs: self.config.timeout_secs,
            }
        } else {
            GenerationError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = ChatRequest::new(
            &self.config.model,
            self.config.temperature,
            &self.config.system_prompt,
            prompt,
        );
        tracing::debug!(model = %self.config.model, prompt_chars = prompt.len(), "chat completion request");

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_failed(&e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.request_failed(&e))?;
        if !status.is_success() {
            let body: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(GenerationError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| GenerationError::Transport(format!("unreadable response body: {e}")))?;
        chat.into_content().ok_or(GenerationError::EmptyResponse)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
