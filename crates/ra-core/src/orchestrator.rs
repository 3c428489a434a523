//! Run Orchestrator
//!
//! The single entry point for both request modes. Wires the schema registry,
//! correction loop and trace recorder together:
//! 1. Open a trace for a fresh [`TraceId`]
//! 2. Build the initial prompt
//! 3. Run the correction loop, recording each attempt as it completes
//! 4. Stamp and seal the final payload
//!
//! The generator is awaited without holding any trace or registry lock.

use crate::config::PipelineConfig;
use crate::correction::{AttemptSink, CorrectionLoop};
use crate::envelope;
use crate::error::PipelineError;
use crate::generator::Generator;
use crate::input::RunInput;
use crate::prompt::{PromptBuilder, TemplatePromptBuilder};
use ra_schema::SchemaRegistry;
use ra_trace::{AttemptRecord, FinalStatus, RunRecord, TraceError, TraceId, TraceJournal, TraceRecorder};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;

/// Result of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutput {
    /// Trace to fetch the attempts from
    pub trace_id: TraceId,
    /// Schema-valid payload
    pub payload: Value,
    /// How the payload was obtained
    pub status: FinalStatus,
    /// Generator calls made
    pub attempts: usize,
}

/// Attempts of one run, forwarded to the shared recorder
struct RecorderSink<'a> {
    recorder: &'a TraceRecorder,
    trace_id: TraceId,
}

impl AttemptSink for RecorderSink<'_> {
    fn record(&self, attempt: &AttemptRecord) -> Result<(), TraceError> {
        self.recorder.record(&self.trace_id, attempt.clone())
    }
}

/// Create the trace recorder described by `config`
///
/// # Errors
/// Returns [`TraceError::Journal`] if the journal directory cannot be created.
pub fn open_recorder(config: &PipelineConfig) -> Result<TraceRecorder, TraceError> {
    match &config.trace_dir {
        Some(dir) => Ok(TraceRecorder::with_journal(TraceJournal::open(dir)?)),
        None => Ok(TraceRecorder::in_memory()),
    }
}

/// Pipeline entry point
pub struct RunOrchestrator {
    config: PipelineConfig,
    registry: Arc<SchemaRegistry>,
    correction: CorrectionLoop,
    generator: Arc<dyn Generator>,
    prompts: Arc<dyn PromptBuilder>,
    recorder: Arc<TraceRecorder>,
}

impl std::fmt::Debug for RunOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOrchestrator")
            .field("config", &self.config)
            .field("generator", &self.generator.name())
            .field("runs", &self.recorder.len())
            .finish_non_exhaustive()
    }
}

impl RunOrchestrator {
    /// Create orchestrator with the default prompt templates
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] for an invalid config, or
    /// [`PipelineError::Schema`] if the schemas fail to compile.
    pub fn new(
        config: PipelineConfig,
        generator: Arc<dyn Generator>,
        recorder: Arc<TraceRecorder>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let registry = Arc::new(SchemaRegistry::new()?);
        let correction = CorrectionLoop::new(Arc::clone(&registry), config.max_attempts)?;
        let prompts = Arc::new(TemplatePromptBuilder::new(&config));
        Ok(Self {
            config,
            registry,
            correction,
            generator,
            prompts,
            recorder,
        })
    }

    /// With a custom prompt builder
    #[inline]
    #[must_use]
    pub fn with_prompt_builder(mut self, prompts: Arc<dyn PromptBuilder>) -> Self {
        self.prompts = prompts;
        self
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Schema registry used for validation
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Shared trace recorder
    #[inline]
    #[must_use]
    pub fn recorder(&self) -> &Arc<TraceRecorder> {
        &self.recorder
    }

    /// Run one request to completion
    ///
    /// Every outcome the generator can cause ends in a schema-valid payload;
    /// the trace records whether it was validated, coerced or a fallback.
    ///
    /// # Errors
    /// - [`PipelineError::InvalidInput`] for blank inputs
    /// - [`PipelineError::Trace`] if the trace store rejects a write
    pub async fn execute(&self, input: RunInput) -> Result<RunOutput, PipelineError> {
        input.validate()?;
        let mode = input.mode();
        let trace_id = TraceId::new();
        let span = tracing::info_span!("run", %trace_id, mode = mode.as_str());

        self.run_traced(trace_id, input).instrument(span).await
    }

    async fn run_traced(&self, trace_id: TraceId, input: RunInput) -> Result<RunOutput, PipelineError> {
        let mode = input.mode();
        let summary = input.summary();
        self.recorder.open(trace_id, mode, summary.clone())?;
        tracing::info!(generator = self.generator.name(), "run started");

        let prompt = self.prompts.build(&input, None);
        let sink = RecorderSink {
            recorder: &self.recorder,
            trace_id,
        };
        let outcome = self
            .correction
            .run(
                &input,
                prompt,
                self.generator.as_ref(),
                self.prompts.as_ref(),
                &sink,
            )
            .await?;

        let payload = envelope::stamp(
            outcome.payload,
            trace_id,
            &summary,
            mode.schema_version(),
            outcome.status,
            &outcome.repairs,
        );
        let record = self.recorder.complete(&trace_id, payload.clone(), outcome.status)?;
        tracing::info!(
            status = %outcome.status,
            attempts = record.attempts.len(),
            "run finished"
        );

        Ok(RunOutput {
            trace_id,
            payload,
            status: outcome.status,
            attempts: record.attempts.len(),
        })
    }

    /// Fetch the trace of a run, complete or partial
    ///
    /// # Errors
    /// Returns [`TraceError::NotFound`] for unknown identifiers.
    pub fn trace(&self, trace_id: &TraceId) -> Result<Arc<RunRecord>, TraceError> {
        self.recorder.get(trace_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ScriptedGenerator;
    use ra_test_utils::{pdf_payload, raw};

    fn orchestrator(generator: ScriptedGenerator) -> RunOrchestrator {
        RunOrchestrator::new(
            PipelineConfig::new(),
            Arc::new(generator),
            Arc::new(TraceRecorder::in_memory()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn blank_input_opens_no_trace() {
        let orch = orchestrator(ScriptedGenerator::always("{}"));
        let err = orch.execute(RunInput::topic("   ")).await.unwrap_err();
        assert!(err.is_caller_error());
        assert!(orch.recorder().is_empty());
    }

    #[tokio::test]
    async fn output_matches_sealed_trace() {
        let orch = orchestrator(ScriptedGenerator::always(raw(&pdf_payload())));
        let out = orch
            .execute(RunInput::pdf("attention.pdf", "[PAGE 1] Attention"))
            .await
            .unwrap();
        let record = orch.trace(&out.trace_id).unwrap();
        assert_eq!(record.final_payload.as_ref(), Some(&out.payload));
        assert_eq!(record.final_status, Some(out.status));
        assert_eq!(out.payload["input"]["pdf_name"], "attention.pdf");
    }

    #[test]
    fn invalid_config_rejected() {
        let err = RunOrchestrator::new(
            PipelineConfig::new().with_max_attempts(0),
            Arc::new(ScriptedGenerator::always("{}")),
            Arc::new(TraceRecorder::in_memory()),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn recorder_follows_config() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = open_recorder(&PipelineConfig::new().with_trace_dir(dir.path())).unwrap();
        assert_eq!(recorder.journal().map(TraceJournal::dir), Some(dir.path()));
        assert!(open_recorder(&PipelineConfig::new()).unwrap().journal().is_none());
    }
}
