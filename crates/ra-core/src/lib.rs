//! Research Agent Core
//!
//! Turns an unreliable text generator into a component that always returns a
//! schema-valid payload:
//! - [`CorrectionLoop`] drives generate → validate → coerce → retry as an
//!   explicit state machine, falling back to a static payload when the retry
//!   budget runs out
//! - [`RunOrchestrator`] is the single entry point: it builds the initial
//!   prompt, runs the loop, persists each attempt as it happens, and returns
//!   the final payload with its trace identifier
//!
//! The generator and the prompt builder are capability objects
//! ([`Generator`], [`PromptBuilder`]) handed in by the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use ra_core::{PipelineConfig, RunInput, RunOrchestrator, ScriptedGenerator};
//! use ra_trace::TraceRecorder;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let generator = Arc::new(ScriptedGenerator::always("not json at all"));
//! let recorder = Arc::new(TraceRecorder::in_memory());
//! let orchestrator = RunOrchestrator::new(PipelineConfig::new(), generator, recorder)?;
//!
//! let output = orchestrator.execute(RunInput::topic("diffusion models")).await?;
//! println!("{} -> {}", output.trace_id, output.status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod correction;
pub mod envelope;
pub mod error;
pub mod generator;
pub mod input;
pub mod orchestrator;
pub mod prompt;

pub use config::PipelineConfig;
pub use correction::{AttemptSink, CorrectionLoop, LoopOutcome};
pub use error::{ConfigError, GenerationError, PipelineError};
pub use generator::{Generator, ScriptedGenerator};
pub use input::{CandidatePaper, RunInput};
pub use orchestrator::{open_recorder, RunOrchestrator, RunOutput};
pub use prompt::{corrective_instruction, PromptBuilder, TemplatePromptBuilder};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running the pipeline
    pub use crate::{
        Generator, PipelineConfig, PromptBuilder, RunInput, RunOrchestrator, RunOutput,
        ScriptedGenerator,
    };
    pub use ra_trace::{FinalStatus, RunRecord, TraceId, TraceRecorder};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
