//! Provider configuration

use serde::{Deserialize, Serialize};
use std::fmt;

/// API key variable
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
/// Model override variable
pub const ENV_MODEL: &str = "OPENAI_MODEL";
/// Endpoint override variable
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a research assistant agent.
You must produce useful, actionable outputs for reproducing research.
Always output STRICT JSON. Do not include markdown.
If evidence is required and not available, be explicit and keep claims conservative.
";

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OpenAiConfigError {
    /// No API key configured
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    /// Temperature outside the provider's accepted range
    #[error("temperature must be within 0.0..=2.0, got {0}")]
    InvalidTemperature(f32),

    /// Request timeout of zero
    #[error("timeout_secs must be greater than 0")]
    ZeroTimeout,

    /// HTTP client could not be built
    #[error("cannot build HTTP client: {0}")]
    HttpClient(String),
}

/// Chat-completions provider settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API root, without the `/chat/completions` suffix
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Bearer token
    pub api_key: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Whole-request timeout
    pub timeout_secs: u64,
    /// System message sent before every prompt
    pub system_prompt: String,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl OpenAiConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read key, model and endpoint from the process environment
    ///
    /// # Errors
    /// Returns [`OpenAiConfigError::MissingApiKey`] if no key is set.
    pub fn from_env() -> Result<Self, OpenAiConfigError> {
        Self::from_vars(|var| std::env::var(var).ok())
    }

    /// Read key, model and endpoint from an arbitrary variable source
    ///
    /// # Errors
    /// As [`Self::from_env`].
    pub fn from_vars<F>(lookup: F) -> Result<Self, OpenAiConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self {
            api_key: present(ENV_API_KEY).ok_or(OpenAiConfigError::MissingApiKey)?,
            ..Self::default()
        };
        if let Some(model) = present(ENV_MODEL) {
            config.model = model;
        }
        if let Some(url) = present(ENV_BASE_URL) {
            config.base_url = url;
        }
        config.validate()?;
        Ok(config)
    }

    /// With model
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// With endpoint root
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// With API key
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Full chat-completions URL
    #[must_use]
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Check the configuration
    ///
    /// # Errors
    /// Returns [`OpenAiConfigError`] for a missing key, a zero timeout or an
    /// out-of-range temperature.
    pub fn validate(&self) -> Result<(), OpenAiConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(OpenAiConfigError::MissingApiKey);
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(OpenAiConfigError::InvalidTemperature(self.temperature));
        }
        if self.timeout_secs == 0 {
            return Err(OpenAiConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: String::new(),
            temperature: 0.2,
            timeout_secs: 90,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}
