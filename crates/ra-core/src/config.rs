//! Pipeline configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment override for [`PipelineConfig::max_attempts`]
pub const ENV_MAX_ATTEMPTS: &str = "RA_MAX_ATTEMPTS";
/// Environment override for [`PipelineConfig::trace_dir`]
pub const ENV_TRACE_DIR: &str = "TRACE_DIR";

/// Configuration for one orchestrator instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Generator invocations allowed per run (at least 1)
    pub max_attempts: u32,
    /// Directory for the JSON-lines trace journal; memory only if unset
    pub trace_dir: Option<PathBuf>,
    /// PDF text characters included in the prompt
    pub max_pdf_chars: usize,
    /// Abstract characters included per candidate paper
    pub max_abstract_chars: usize,
    /// Validation errors listed in a corrective prompt
    pub max_prompt_issues: usize,
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With retry budget
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// With trace journal directory
    #[inline]
    #[must_use]
    pub fn with_trace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.trace_dir = Some(dir.into());
        self
    }

    /// With PDF prompt limit
    #[inline]
    #[must_use]
    pub fn with_max_pdf_chars(mut self, chars: usize) -> Self {
        self.max_pdf_chars = chars;
        self
    }

    /// With number of issues listed in corrective prompts
    #[inline]
    #[must_use]
    pub fn with_max_prompt_issues(mut self, issues: usize) -> Self {
        self.max_prompt_issues = issues;
        self
    }

    /// Check the configuration
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the retry budget or a prompt limit is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(self.max_attempts));
        }
        for (field, value) in [
            ("max_pdf_chars", self.max_pdf_chars),
            ("max_abstract_chars", self.max_abstract_chars),
            ("max_prompt_issues", self.max_prompt_issues),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroLimit { field });
            }
        }
        Ok(())
    }

    /// Parse from TOML; missing keys take their defaults
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] or the result of [`Self::validate`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply `RA_MAX_ATTEMPTS` and `TRACE_DIR` from the process environment
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidEnv`] if `RA_MAX_ATTEMPTS` is not a number.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable source
    ///
    /// # Errors
    /// As [`Self::apply_env`].
    pub fn apply_vars<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_ATTEMPTS) {
            self.max_attempts = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv {
                    var: ENV_MAX_ATTEMPTS,
                    value,
                })?;
        }
        if let Some(dir) = lookup(ENV_TRACE_DIR).filter(|d| !d.trim().is_empty()) {
            self.trace_dir = Some(PathBuf::from(dir));
        }
        self.validate()?;
        Ok(self)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            trace_dir: None,
            max_pdf_chars: 180_000,
            max_abstract_chars: 1_200,
            max_prompt_issues: 12,
        }
    }
}
