//! Validation outcomes
//!
//! A failed validation is data, not an error: every violation becomes a
//! [`ValidationIssue`] that later feeds repairs, corrective prompts and the
//! execution trace.

use crate::path::FieldPath;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Classification of a single validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input was not parseable as JSON
    MalformedJson,
    /// Required field absent
    MissingField,
    /// Value has the wrong JSON type
    WrongType,
    /// Array length outside the schema bounds
    OutOfRange,
    /// Value not in the allowed enum domain
    InvalidEnum,
    /// Generator call failed (transport/timeout); never produced by the registry
    GenerationError,
}

impl ErrorKind {
    /// Snake-case name of the kind
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MalformedJson => "malformed_json",
            ErrorKind::MissingField => "missing_field",
            ErrorKind::WrongType => "wrong_type",
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::InvalidEnum => "invalid_enum",
            ErrorKind::GenerationError => "generation_error",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(field_path, error_kind)` finding
///
/// `detail` carries a human-readable description of the violated constraint
/// (for example "must contain exactly 5 items, found 4").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Location of the offending value
    pub path: FieldPath,
    /// Failure class
    pub kind: ErrorKind,
    /// Constraint description
    pub detail: String,
}

impl ValidationIssue {
    /// Create new issue
    #[inline]
    #[must_use]
    pub fn new(path: FieldPath, kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            detail: detail.into(),
        }
    }

    /// Issue for unparseable generator output
    #[inline]
    #[must_use]
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(FieldPath::root(), ErrorKind::MalformedJson, detail)
    }

    /// Issue for a failed generator call
    #[inline]
    #[must_use]
    pub fn generation(detail: impl Into<String>) -> Self {
        Self::new(FieldPath::root(), ErrorKind::GenerationError, detail)
    }
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.path, self.kind, self.detail)
    }
}

/// Result of validating a payload against a schema version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "issues", rename_all = "snake_case")]
pub enum ValidationResult {
    /// Payload satisfies the schema
    Valid,
    /// Payload violates the schema; issues are sorted by path then kind
    Invalid(Vec<ValidationIssue>),
}

impl ValidationResult {
    /// Build a result from a list of issues
    #[must_use]
    pub fn from_issues(mut issues: Vec<ValidationIssue>) -> Self {
        if issues.is_empty() {
            return Self::Valid;
        }
        issues.sort();
        issues.dedup();
        Self::Invalid(issues)
    }

    /// Check if the payload was valid
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Issues found (empty when valid)
    #[inline]
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            Self::Valid => &[],
            Self::Invalid(issues) => issues,
        }
    }

    /// Consume into issues (empty when valid)
    #[inline]
    #[must_use]
    pub fn into_issues(self) -> Vec<ValidationIssue> {
        match self {
            Self::Valid => Vec::new(),
            Self::Invalid(issues) => issues,
        }
    }

    /// Check if any issue has the given kind
    #[inline]
    #[must_use]
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.issues().iter().any(|i| i.kind == kind)
    }
}
