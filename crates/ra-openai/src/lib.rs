//! OpenAI-compatible generator
//!
//! [`OpenAiGenerator`] implements [`ra_core::Generator`] over the
//! `/chat/completions` endpoint, asking for a JSON object response. It makes
//! exactly one request per call; retries belong to the correction loop.

pub mod client;
pub mod config;
mod wire;

pub use client::OpenAiGenerator;
pub use config::{OpenAiConfig, OpenAiConfigError};
