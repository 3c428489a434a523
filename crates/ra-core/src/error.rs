//! Error types for the pipeline
//!
//! Validation failures are data ([`ra_schema::ValidationIssue`]) and never
//! surface here. These errors cover:
//! - Generator call failures (absorbed by the correction loop)
//! - Configuration problems
//! - Caller input the pipeline cannot run
//! - Trace store failures

use ra_schema::SchemaError;
use ra_trace::TraceError;
use std::path::PathBuf;

/// Failure of a single generator call
///
/// The correction loop turns these into a `generation_error` attempt that
/// consumes one unit of the retry budget.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Request could not be sent or the response could not be read
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider did not answer in time
    #[error("generator timed out after {secs}s")]
    Timeout {
        /// Configured timeout
        secs: u64,
    },

    /// Provider answered with a non-success status
    #[error("provider returned {status}: {body}")]
    Provider {
        /// HTTP status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// Provider answered without any content
    #[error("provider returned no content")]
    EmptyResponse,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Retry budget must allow at least one generation
    #[error("max_attempts must be at least 1, got {0}")]
    InvalidMaxAttempts(u32),

    /// A prompt limit is zero
    #[error("{field} must be greater than 0")]
    ZeroLimit {
        /// Offending field
        field: &'static str,
    },

    /// Config file could not be read
    #[error("cannot read config {path}: {source}")]
    Read {
        /// Config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for this structure
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Environment variable holds an unusable value
    #[error("environment variable {var}={value:?} is invalid")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Value found
        value: String,
    },
}

/// Errors returned by [`crate::RunOrchestrator::execute`]
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Input cannot be run (empty topic, empty text)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Mode is not one of the known request modes
    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),

    /// Trace store rejected an operation
    #[error("trace store error: {0}")]
    Trace(#[from] TraceError),

    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Schema registry could not be built
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl PipelineError {
    /// Check if the caller can fix this by changing the request
    #[inline]
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::UnsupportedMode(_))
    }
}

impl From<ra_schema::ModeParseError> for PipelineError {
    fn from(err: ra_schema::ModeParseError) -> Self {
        Self::UnsupportedMode(err.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_are_classified() {
        assert!(PipelineError::InvalidInput("empty topic".into()).is_caller_error());
        assert!(PipelineError::UnsupportedMode("video".into()).is_caller_error());
        assert!(!PipelineError::Config(ConfigError::InvalidMaxAttempts(0)).is_caller_error());
    }

    #[test]
    fn mode_parse_error_maps_to_unsupported_mode() {
        let err: PipelineError = "video".parse::<ra_schema::Mode>().unwrap_err().into();
        assert!(matches!(err, PipelineError::UnsupportedMode(ref m) if m == "video"));
    }

    #[test]
    fn generation_errors_render() {
        assert_eq!(
            GenerationError::Timeout { secs: 30 }.to_string(),
            "generator timed out after 30s"
        );
        assert_eq!(
            GenerationError::Provider {
                status: 429,
                body: "rate limited".into()
            }
            .to_string(),
            "provider returned 429: rate limited"
        );
    }
}
