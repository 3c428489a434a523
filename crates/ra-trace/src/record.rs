//! Trace data model

use chrono::{DateTime, Utc};
use ra_coerce::RepairKind;
use ra_schema::{Mode, SchemaVersion, ValidationIssue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Unique run identifier, rendered as 32 hex digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TraceId(Uuid);

impl TraceId {
    /// Generate new random trace ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TraceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for TraceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl TryFrom<String> for TraceId {
    type Error = uuid::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TraceId> for String {
    fn from(id: TraceId) -> Self {
        id.to_string()
    }
}

/// Outcome of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Output validated (directly or after coercion)
    Success,
    /// Output invalid; budget remains for another attempt
    RetryableFailure,
    /// Output invalid and the budget is spent
    TerminalFailure,
}

/// Which prompt an attempt was generated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptVariant {
    /// Mode-specific initial prompt
    Initial,
    /// Prompt carrying the previous attempt's validation errors
    Corrective,
}

/// One generation-and-validation cycle within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 0-based position within the run
    pub attempt_index: u32,
    /// Prompt variant used
    pub prompt_variant: PromptVariant,
    /// Full prompt text sent to the generator
    pub prompt: String,
    /// Unmodified generator output (empty if the call failed)
    pub raw_output: String,
    /// Repairs performed during the attempt, in order
    pub coercion_applied: Vec<RepairKind>,
    /// Issues found; empty iff the attempt succeeded
    pub validation_errors: Vec<ValidationIssue>,
    /// Attempt outcome
    pub outcome: AttemptOutcome,
    /// When the generator was invoked
    pub started_at: DateTime<Utc>,
    /// Wall-clock time of the attempt
    pub elapsed_ms: u64,
}

impl AttemptRecord {
    /// Check if the attempt succeeded
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }
}

/// How the final payload was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    /// Generator output validated as-is
    Validated,
    /// Generator output validated after repairs
    Coerced,
    /// Retry budget exhausted; static placeholder returned
    Fallback,
}

impl FinalStatus {
    /// Snake-case name of the status
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FinalStatus::Validated => "validated",
            FinalStatus::Coerced => "coerced",
            FinalStatus::Fallback => "fallback",
        }
    }
}

impl Display for FinalStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One end-to-end run
///
/// `final_payload`/`final_status`/`finished_at` stay `None` while the run is
/// in progress, or forever if the run was abandoned mid-way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identifier
    pub trace_id: TraceId,
    /// Request mode
    pub mode: Mode,
    /// Schema version the run validated against
    pub schema_version: SchemaVersion,
    /// Normalized input, embedded verbatim in the final payload
    pub input_summary: Value,
    /// Attempts in chronological order
    pub attempts: Vec<AttemptRecord>,
    /// Payload returned to the caller
    pub final_payload: Option<Value>,
    /// How the payload was obtained
    pub final_status: Option<FinalStatus>,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run completion
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Create new in-progress record
    #[must_use]
    pub fn new(trace_id: TraceId, mode: Mode, input_summary: Value) -> Self {
        Self {
            trace_id,
            mode,
            schema_version: mode.schema_version(),
            input_summary,
            attempts: Vec::new(),
            final_payload: None,
            final_status: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Check if the run has a final status
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.final_status.is_some()
    }

    /// Last recorded attempt
    #[inline]
    #[must_use]
    pub fn last_attempt(&self) -> Option<&AttemptRecord> {
        self.attempts.last()
    }

    /// Check that `status` agrees with the last attempt
    ///
    /// # Errors
    /// Returns a description of the disagreement.
    pub fn check_status(&self, status: FinalStatus) -> Result<(), String> {
        let last = self
            .last_attempt()
            .ok_or_else(|| "run has no attempts".to_string())?;
        let ok = match status {
            FinalStatus::Validated => {
                last.succeeded()
                    && last.coercion_applied.is_empty()
                    && last.validation_errors.is_empty()
            }
            FinalStatus::Coerced => {
                last.succeeded()
                    && !last.coercion_applied.is_empty()
                    && last.validation_errors.is_empty()
            }
            FinalStatus::Fallback => last.outcome == AttemptOutcome::TerminalFailure,
        };
        if ok {
            Ok(())
        } else {
            Err(format!(
                "status {status} contradicts last attempt {} ({:?})",
                last.attempt_index, last.outcome
            ))
        }
    }
}
