//! Coercion engine
//!
//! Orchestrates the repair passes for one attempt and re-validates the
//! candidate through the schema registry after every pass.

use crate::passes::{strip_prose, PassResult, RepairKind};
use ra_schema::{ErrorKind, SchemaRegistry, SchemaVersion, ValidationIssue, ValidationResult};
use serde_json::Value;
use std::sync::Arc;

/// Outcome of a coercion attempt
#[derive(Debug, Clone, PartialEq)]
pub enum CoercionOutcome {
    /// Repairs produced a schema-valid payload
    Repaired {
        /// The valid candidate
        payload: Value,
        /// Repairs performed, in order (never empty)
        applied: Vec<RepairKind>,
    },
    /// No sequence of mechanical repairs makes the output valid
    Unrepairable {
        /// Repairs that ran before giving up
        attempted: Vec<RepairKind>,
        /// Issues still present after those repairs
        remaining: Vec<ValidationIssue>,
    },
}

impl CoercionOutcome {
    /// Check if coercion produced a valid payload
    #[inline]
    #[must_use]
    pub fn is_repaired(&self) -> bool {
        matches!(self, Self::Repaired { .. })
    }
}

/// Deterministic, non-LLM repair engine
#[derive(Debug, Clone)]
pub struct CoercionEngine {
    registry: Arc<SchemaRegistry>,
}

impl CoercionEngine {
    /// Create new engine over a shared registry
    #[inline]
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// Get the registry used for re-validation
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Attempt to repair `raw` given the issues the registry reported for it
    ///
    /// `issues` must be the registry's validation of `raw` under `version`.
    /// An empty issue list means there is nothing to repair.
    #[must_use]
    pub fn coerce(
        &self,
        raw: &str,
        issues: &[ValidationIssue],
        version: SchemaVersion,
    ) -> CoercionOutcome {
        if issues.is_empty() {
            return CoercionOutcome::Unrepairable {
                attempted: Vec::new(),
                remaining: Vec::new(),
            };
        }

        let mut applied = Vec::new();
        let registry = self.registry();

        let (mut payload, mut current) = match registry.parse(raw) {
            Ok(payload) if !issues.iter().any(|i| i.kind == ErrorKind::MalformedJson) => {
                let current = ValidationResult::from_issues(issues.to_vec());
                (payload, current)
            }
            Ok(payload) => {
                let current = registry.validate(&payload, version);
                (payload, current)
            }
            Err(issue) => {
                let Some(payload) = strip_prose(raw).and_then(|span| registry.parse(span).ok())
                else {
                    tracing::debug!("no JSON document recoverable from output");
                    return CoercionOutcome::Unrepairable {
                        attempted: Vec::new(),
                        remaining: vec![issue],
                    };
                };
                applied.push(RepairKind::StripProse);
                let current = registry.validate(&payload, version);
                (payload, current)
            }
        };

        for pass in RepairKind::STRUCTURAL {
            if current.is_valid() {
                break;
            }
            match pass.apply(&payload, current.issues(), registry, version) {
                PassResult::Applied(next) => {
                    tracing::debug!(repair = %pass, "repair pass applied");
                    payload = next;
                    applied.push(pass);
                    current = registry.validate(&payload, version);
                }
                PassResult::NotApplicable => {}
                PassResult::Failed(reason) => {
                    tracing::debug!(repair = %pass, %reason, "repair pass failed");
                }
            }
        }

        if current.is_valid() && !applied.is_empty() {
            CoercionOutcome::Repaired { payload, applied }
        } else {
            CoercionOutcome::Unrepairable {
                attempted: applied,
                remaining: current.into_issues(),
            }
        }
    }
}
