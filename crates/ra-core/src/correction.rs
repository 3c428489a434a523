//! Correction Loop
//!
//! One run is a sequence of attempts driven by an explicit state machine:
//!
//! ```text
//! Generating ──ok──▶ Validating ──valid──▶ Done(validated)
//!     │                  │
//!     │ err              └─invalid─▶ Coercing ──repaired──▶ Done(coerced)
//!     ▼                                  │
//!   Failed ◀──────────── unrepairable ───┘
//!     │
//!     ├─ budget left ──▶ Generating (corrective prompt)
//!     └─ exhausted ────▶ Done(fallback)
//! ```
//!
//! Every attempt is handed to an [`AttemptSink`] the moment its outcome is
//! known, so an abandoned run leaves each finished attempt behind.

use crate::error::{ConfigError, GenerationError};
use crate::generator::Generator;
use crate::input::RunInput;
use crate::prompt::PromptBuilder;
use chrono::{DateTime, Utc};
use ra_coerce::{CoercionEngine, CoercionOutcome, RepairKind};
use ra_schema::{SchemaRegistry, ValidationIssue};
use ra_trace::{AttemptOutcome, AttemptRecord, FinalStatus, PromptVariant, TraceError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Receives attempts as they complete
pub trait AttemptSink: Send + Sync {
    /// Persist one attempt
    ///
    /// # Errors
    /// Returns [`TraceError`] if the attempt cannot be stored.
    fn record(&self, attempt: &AttemptRecord) -> Result<(), TraceError>;
}

impl AttemptSink for parking_lot::Mutex<Vec<AttemptRecord>> {
    fn record(&self, attempt: &AttemptRecord) -> Result<(), TraceError> {
        self.lock().push(attempt.clone());
        Ok(())
    }
}

/// Terminal result of a run
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    /// Schema-valid payload (generator output or fallback)
    pub payload: Value,
    /// How the payload was obtained
    pub status: FinalStatus,
    /// Repairs applied to the accepted payload
    pub repairs: Vec<RepairKind>,
    /// All attempts, in order
    pub attempts: Vec<AttemptRecord>,
}

/// Attempt in flight: prompt sent, outcome unknown
#[derive(Debug)]
struct Pending {
    index: u32,
    variant: PromptVariant,
    prompt: String,
    raw: String,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl Pending {
    fn finish(
        self,
        coercion: Vec<RepairKind>,
        errors: Vec<ValidationIssue>,
        outcome: AttemptOutcome,
    ) -> AttemptRecord {
        AttemptRecord {
            attempt_index: self.index,
            prompt_variant: self.variant,
            prompt: self.prompt,
            raw_output: self.raw,
            coercion_applied: coercion,
            validation_errors: errors,
            outcome,
            started_at: self.started_at,
            elapsed_ms: u64::try_from(self.clock.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Loop state
#[derive(Debug)]
enum State {
    Generating {
        index: u32,
        variant: PromptVariant,
        prompt: String,
    },
    Validating(Pending),
    Coercing {
        pending: Pending,
        issues: Vec<ValidationIssue>,
    },
    Failed {
        pending: Pending,
        repairs: Vec<RepairKind>,
        issues: Vec<ValidationIssue>,
    },
    Done {
        payload: Value,
        status: FinalStatus,
        repairs: Vec<RepairKind>,
    },
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Generating { .. } => "generating",
            State::Validating(_) => "validating",
            State::Coercing { .. } => "coercing",
            State::Failed { .. } => "failed",
            State::Done { .. } => "done",
        }
    }
}

/// Generate-validate-repair-retry driver
#[derive(Debug, Clone)]
pub struct CorrectionLoop {
    registry: Arc<SchemaRegistry>,
    coercer: CoercionEngine,
    max_attempts: u32,
}

impl CorrectionLoop {
    /// Create loop with a retry budget
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidMaxAttempts`] if `max_attempts` is 0.
    pub fn new(registry: Arc<SchemaRegistry>, max_attempts: u32) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(max_attempts));
        }
        Ok(Self {
            coercer: CoercionEngine::new(Arc::clone(&registry)),
            registry,
            max_attempts,
        })
    }

    /// Retry budget
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Drive one run to a terminal state
    ///
    /// `initial_prompt` is used for attempt 0; later attempts ask `prompts` for
    /// a corrective variant carrying the previous attempt's issues.
    ///
    /// # Errors
    /// Only sink failures are returned; generator failures and invalid
    /// output are absorbed into attempts.
    pub async fn run(
        &self,
        input: &RunInput,
        initial_prompt: String,
        generator: &dyn Generator,
        prompts: &dyn PromptBuilder,
        sink: &dyn AttemptSink,
    ) -> Result<LoopOutcome, TraceError> {
        let version = input.mode().schema_version();
        let mut attempts = Vec::new();
        let mut state = State::Generating {
            index: 0,
            variant: PromptVariant::Initial,
            prompt: initial_prompt,
        };

        loop {
            tracing::debug!(state = state.name(), attempts = attempts.len(), "correction loop step");
            state = match state {
                State::Generating { index, variant, prompt } => {
                    let started_at = Utc::now();
                    let clock = Instant::now();
                    let result = generator.generate(&prompt).await;
                    let mut pending = Pending {
                        index,
                        variant,
                        prompt,
                        raw: String::new(),
                        started_at,
                        clock,
                    };
                    match result {
                        Ok(raw) => {
                            pending.raw = raw;
                            State::Validating(pending)
                        }
                        Err(err) => {
                            tracing::warn!(attempt = index, error = %err, generator = generator.name(), "generation failed");
                            State::Failed {
                                pending,
                                repairs: Vec::new(),
                                issues: vec![generation_issue(&err)],
                            }
                        }
                    }
                }

                State::Validating(pending) => match self.registry.parse(&pending.raw) {
                    Err(issue) => State::Coercing {
                        pending,
                        issues: vec![issue],
                    },
                    Ok(payload) => {
                        let result = self.registry.validate(&payload, version);
                        if result.is_valid() {
                            settle(
                                pending.finish(Vec::new(), Vec::new(), AttemptOutcome::Success),
                                &mut attempts,
                                sink,
                            )?;
                            State::Done {
                                payload,
                                status: FinalStatus::Validated,
                                repairs: Vec::new(),
                            }
                        } else {
                            State::Coercing {
                                pending,
                                issues: result.into_issues(),
                            }
                        }
                    }
                },

                State::Coercing { pending, issues } => {
                    match self.coercer.coerce(&pending.raw, &issues, version) {
                        CoercionOutcome::Repaired { payload, applied } => {
                            tracing::debug!(attempt = pending.index, repairs = ?applied, "output repaired");
                            settle(
                                pending.finish(applied.clone(), Vec::new(), AttemptOutcome::Success),
                                &mut attempts,
                                sink,
                            )?;
                            State::Done {
                                payload,
                                status: FinalStatus::Coerced,
                                repairs: applied,
                            }
                        }
                        CoercionOutcome::Unrepairable { attempted, remaining } => {
                            // Remaining issues describe the recovered document, so a
                            // prose-wrapped payload is corrected for what it lacks
                            // rather than for being unparseable.
                            let issues = if remaining.is_empty() { issues } else { remaining };
                            State::Failed {
                                pending,
                                repairs: attempted,
                                issues,
                            }
                        }
                    }
                }

                State::Failed { pending, repairs, issues } => {
                    let index = pending.index;
                    if index + 1 < self.max_attempts {
                        let prompt = prompts.build(input, Some(&issues));
                        tracing::debug!(attempt = index, issues = issues.len(), "retrying with corrective prompt");
                        settle(
                            pending.finish(repairs, issues, AttemptOutcome::RetryableFailure),
                            &mut attempts,
                            sink,
                        )?;
                        State::Generating {
                            index: index + 1,
                            variant: PromptVariant::Corrective,
                            prompt,
                        }
                    } else {
                        tracing::warn!(attempts = index + 1, "retry budget exhausted, using fallback");
                        settle(
                            pending.finish(repairs, issues, AttemptOutcome::TerminalFailure),
                            &mut attempts,
                            sink,
                        )?;
                        State::Done {
                            payload: self.registry.fallback(version),
                            status: FinalStatus::Fallback,
                            repairs: Vec::new(),
                        }
                    }
                }

                State::Done { payload, status, repairs } => {
                    return Ok(LoopOutcome {
                        payload,
                        status,
                        repairs,
                        attempts,
                    });
                }
            };
        }
    }
}

fn settle(
    attempt: AttemptRecord,
    attempts: &mut Vec<AttemptRecord>,
    sink: &dyn AttemptSink,
) -> Result<(), TraceError> {
    sink.record(&attempt)?;
    attempts.push(attempt);
    Ok(())
}

fn generation_issue(err: &GenerationError) -> ValidationIssue {
    ValidationIssue::generation(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ScriptedGenerator;
    use crate::prompt::TemplatePromptBuilder;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use ra_schema::ErrorKind;
    use ra_test_utils::{raw, topic_payload, with_priority, without, wrap_in_prose};

    fn correction(max_attempts: u32) -> CorrectionLoop {
        CorrectionLoop::new(Arc::new(SchemaRegistry::new().unwrap()), max_attempts).unwrap()
    }

    async fn drive(max_attempts: u32, generator: &ScriptedGenerator) -> (LoopOutcome, Vec<AttemptRecord>) {
        let sink = Mutex::new(Vec::new());
        let input = RunInput::topic("retrieval augmented generation");
        let prompts = TemplatePromptBuilder::default();
        let outcome = correction(max_attempts)
            .run(&input, prompts.build(&input, None), generator, &prompts, &sink)
            .await
            .unwrap();
        (outcome, sink.into_inner())
    }

    #[test]
    fn zero_budget_rejected() {
        let registry = Arc::new(SchemaRegistry::new().unwrap());
        assert!(matches!(
            CorrectionLoop::new(registry, 0),
            Err(ConfigError::InvalidMaxAttempts(0))
        ));
    }

    #[tokio::test]
    async fn valid_output_settles_in_one_attempt() {
        let generator = ScriptedGenerator::always(raw(&topic_payload()));
        let (outcome, recorded) = drive(3, &generator).await;
        assert_eq!(outcome.status, FinalStatus::Validated);
        assert_eq!(outcome.payload, topic_payload());
        assert_eq!(recorded, outcome.attempts);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].prompt_variant, PromptVariant::Initial);
    }

    #[tokio::test]
    async fn cosmetic_defect_is_coerced_without_retry() {
        let generator = ScriptedGenerator::always(raw(&with_priority(&topic_payload(), 0, "High")));
        let (outcome, recorded) = drive(3, &generator).await;
        assert_eq!(outcome.status, FinalStatus::Coerced);
        assert_eq!(outcome.repairs, vec![RepairKind::NormalizeEnums]);
        assert_eq!(recorded[0].coercion_applied, vec![RepairKind::NormalizeEnums]);
        assert!(recorded[0].validation_errors.is_empty());
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn single_attempt_budget_falls_back_immediately() {
        let generator = ScriptedGenerator::always("nope");
        let (outcome, recorded) = drive(1, &generator).await;
        assert_eq!(outcome.status, FinalStatus::Fallback);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].outcome, AttemptOutcome::TerminalFailure);
        assert_eq!(recorded[0].validation_errors[0].kind, ErrorKind::MalformedJson);
    }

    #[tokio::test]
    async fn generation_errors_consume_budget() {
        let generator = ScriptedGenerator::new([
            Err(GenerationError::Transport("connection reset".into())),
            Ok(raw(&topic_payload())),
        ]);
        let (outcome, recorded) = drive(3, &generator).await;
        assert_eq!(outcome.status, FinalStatus::Validated);
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].raw_output, "");
        assert_eq!(recorded[0].outcome, AttemptOutcome::RetryableFailure);
        assert_eq!(recorded[0].validation_errors[0].kind, ErrorKind::GenerationError);
        assert!(recorded[0].validation_errors[0].detail.contains("connection reset"));
        assert_eq!(recorded[1].prompt_variant, PromptVariant::Corrective);
    }

    #[tokio::test]
    async fn retry_carries_previous_issues() {
        let generator = ScriptedGenerator::from_outputs([
            raw(&without(&topic_payload(), "quality")),
            raw(&topic_payload()),
        ]);
        let (outcome, recorded) = drive(3, &generator).await;
        assert_eq!(outcome.status, FinalStatus::Validated);
        assert_eq!(recorded[0].validation_errors[0].path.to_string(), "quality");
        let prompts = generator.prompts();
        assert!(prompts[1].contains("the field `quality` is missing"));
        assert_eq!(recorded[1].prompt, prompts[1]);
    }

    #[tokio::test]
    async fn prose_wrapped_defect_is_corrected_by_name() {
        let generator = ScriptedGenerator::from_outputs([
            wrap_in_prose(&raw(&without(&topic_payload(), "quality"))),
            raw(&topic_payload()),
        ]);
        let (outcome, recorded) = drive(3, &generator).await;
        assert_eq!(outcome.status, FinalStatus::Validated);

        let first = &recorded[0];
        assert_eq!(first.outcome, AttemptOutcome::RetryableFailure);
        assert_eq!(first.coercion_applied, vec![RepairKind::StripProse]);
        assert_eq!(first.validation_errors.len(), 1);
        assert_eq!(first.validation_errors[0].kind, ErrorKind::MissingField);
        assert_eq!(first.validation_errors[0].path.to_string(), "quality");

        let retry = &generator.prompts()[1];
        assert!(retry.contains("the field `quality` is missing"));
        assert!(!retry.contains("not valid JSON"));
    }

    #[tokio::test]
    async fn failed_attempt_keeps_repairs_that_ran() {
        let payload = without(&with_priority(&topic_payload(), 0, "High"), "quality");
        let generator = ScriptedGenerator::always(raw(&payload));
        let (outcome, recorded) = drive(1, &generator).await;
        assert_eq!(outcome.status, FinalStatus::Fallback);
        assert_eq!(recorded[0].outcome, AttemptOutcome::TerminalFailure);
        assert_eq!(recorded[0].coercion_applied, vec![RepairKind::NormalizeEnums]);
        assert_eq!(recorded[0].validation_errors[0].kind, ErrorKind::MissingField);
    }

    struct FailingSink;

    impl AttemptSink for FailingSink {
        fn record(&self, attempt: &AttemptRecord) -> Result<(), TraceError> {
            Err(TraceError::Inconsistent {
                trace_id: ra_trace::TraceId::new(),
                reason: format!("refused attempt {}", attempt.attempt_index),
            })
        }
    }

    #[tokio::test]
    async fn sink_failures_stop_the_loop() {
        let generator = ScriptedGenerator::always("nope");
        let input = RunInput::topic("t");
        let prompts = TemplatePromptBuilder::default();
        let err = correction(3)
            .run(&input, "p".into(), &generator, &prompts, &FailingSink)
            .await
            .unwrap_err();
        assert!(matches!(err, TraceError::Inconsistent { .. }));
        assert_eq!(generator.calls(), 1);
    }
}
