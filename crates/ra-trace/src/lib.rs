//! Trace Recorder
//!
//! Records every generation attempt of a run under the run's [`TraceId`] and
//! serves the resulting [`RunRecord`] for later diagnosis:
//! - [`TraceRecorder::open`] registers a run at its start
//! - [`TraceRecorder::record`] appends one [`AttemptRecord`] per attempt, as it happens
//! - [`TraceRecorder::complete`] seals the record once the final status is known
//! - [`TraceRecorder::get`] returns the record, complete or partial
//!
//! The store is an explicitly owned service: create it at process start, hand
//! it to the orchestrator behind an `Arc`, and drop it (or call
//! [`TraceRecorder::shutdown`]) at process stop. An optional [`TraceJournal`]
//! mirrors every event to one JSON-lines file per run.

pub mod error;
pub mod journal;
pub mod record;
pub mod recorder;

pub use error::TraceError;
pub use journal::{TraceEvent, TraceJournal};
pub use record::{AttemptOutcome, AttemptRecord, FinalStatus, PromptVariant, RunRecord, TraceId};
pub use recorder::TraceRecorder;
