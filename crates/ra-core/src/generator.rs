//! Generator capability
//!
//! The pipeline treats text generation as an opaque `prompt -> text` call.
//! Implementations must not retry, back off or rate-limit; the correction
//! loop owns all of that.

use crate::error::GenerationError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Text generator
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce raw output for a prompt
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Name used in logs
    fn name(&self) -> &str {
        "generator"
    }
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Arc<G> {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

type Step = Result<String, GenerationError>;

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<Step>,
    last: Option<Step>,
    prompts: Vec<String>,
}

/// Deterministic generator that plays back a fixed script
///
/// Each call returns the next scripted step; once the script runs out the
/// last step repeats. Every prompt received is kept for inspection.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<Script>,
}

impl ScriptedGenerator {
    /// Create from scripted outcomes
    #[must_use]
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Mutex::new(Script {
                steps: steps.into_iter().collect(),
                ..Script::default()
            }),
        }
    }

    /// Create from raw outputs only
    #[must_use]
    pub fn from_outputs<S: Into<String>>(outputs: impl IntoIterator<Item = S>) -> Self {
        Self::new(outputs.into_iter().map(|s| Ok(s.into())))
    }

    /// Always return the same output
    #[must_use]
    pub fn always(output: impl Into<String>) -> Self {
        Self::new([Ok(output.into())])
    }

    /// Prompts received so far, in call order
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.script.lock().prompts.clone()
    }

    /// Number of calls made
    #[must_use]
    pub fn calls(&self) -> usize {
        self.script.lock().prompts.len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut script = self.script.lock();
        script.prompts.push(prompt.to_string());
        if let Some(step) = script.steps.pop_front() {
            script.last = Some(step.clone());
            return step;
        }
        script.last.clone().unwrap_or(Err(GenerationError::EmptyResponse))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
