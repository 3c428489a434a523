//! Compiled schema registry
//!
//! Wraps one compiled JSON Schema per [`SchemaVersion`] and translates the
//! validator's findings into [`ValidationIssue`]s. Validation is pure: it
//! takes the payload by shared reference and keeps no state between calls.

use crate::documents;
use crate::error::SchemaError;
use crate::fallback;
use crate::issue::{ErrorKind, ValidationIssue, ValidationResult};
use crate::mode::SchemaVersion;
use crate::path::{FieldPath, Segment};
use jsonschema::error::{ValidationError, ValidationErrorKind};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use std::fmt;

/// Length bounds on an array field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayBounds {
    /// Minimum item count
    pub min: Option<usize>,
    /// Maximum item count
    pub max: Option<usize>,
}

impl ArrayBounds {
    /// Check whether a length satisfies the bounds
    #[inline]
    #[must_use]
    pub fn contains(&self, len: usize) -> bool {
        self.min.map_or(true, |min| len >= min) && self.max.map_or(true, |max| len <= max)
    }

    /// Constraint phrased as an instruction
    #[must_use]
    pub fn describe(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) if min == max => format!("must contain exactly {min} items"),
            (Some(min), Some(max)) => format!("must contain between {min} and {max} items"),
            (Some(min), None) => format!("must contain at least {min} items"),
            (None, Some(max)) => format!("must contain at most {max} items"),
            (None, None) => "has no length bounds".to_string(),
        }
    }
}

struct CompiledSchema {
    document: Value,
    validator: JSONSchema,
}

impl CompiledSchema {
    fn compile(version: SchemaVersion) -> Result<Self, SchemaError> {
        let document = documents::document(version);
        let validator = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&document)
            .map_err(|e| SchemaError::Compile {
                version,
                reason: e.to_string(),
            })?;
        Ok(Self {
            document,
            validator,
        })
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("id", &self.document.get("$id"))
            .finish_non_exhaustive()
    }
}

/// Registry of the versioned output schemas
///
/// Constructed once at startup and shared read-only (`Arc<SchemaRegistry>`)
/// across runs.
#[derive(Debug)]
pub struct SchemaRegistry {
    topic: CompiledSchema,
    pdf: CompiledSchema,
}

impl SchemaRegistry {
    /// Compile the built-in schemas
    ///
    /// # Errors
    /// Returns [`SchemaError::Compile`] if a built-in document is rejected by
    /// the schema compiler.
    pub fn new() -> Result<Self, SchemaError> {
        Ok(Self {
            topic: CompiledSchema::compile(SchemaVersion::TopicV1)?,
            pdf: CompiledSchema::compile(SchemaVersion::PdfV1)?,
        })
    }

    fn compiled(&self, version: SchemaVersion) -> &CompiledSchema {
        match version {
            SchemaVersion::TopicV1 => &self.topic,
            SchemaVersion::PdfV1 => &self.pdf,
        }
    }

    /// Schema document for a version
    #[inline]
    #[must_use]
    pub fn document(&self, version: SchemaVersion) -> &Value {
        &self.compiled(version).document
    }

    /// Parse raw generator text as JSON
    ///
    /// # Errors
    /// Returns a `malformed_json` issue at the root if the text is not JSON.
    pub fn parse(&self, raw: &str) -> Result<Value, ValidationIssue> {
        serde_json::from_str(raw.trim())
            .map_err(|e| ValidationIssue::malformed(format!("output is not valid JSON: {e}")))
    }

    /// Validate a payload against a schema version
    #[must_use]
    pub fn validate(&self, payload: &Value, version: SchemaVersion) -> ValidationResult {
        let compiled = self.compiled(version);
        let issues: Vec<ValidationIssue> = match compiled.validator.validate(payload) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|error| self.issue_from(version, payload, &error))
                .collect(),
        };
        ValidationResult::from_issues(issues)
    }

    /// Parse then validate raw generator text
    #[must_use]
    pub fn validate_text(&self, raw: &str, version: SchemaVersion) -> ValidationResult {
        match self.parse(raw) {
            Ok(payload) => self.validate(&payload, version),
            Err(issue) => ValidationResult::Invalid(vec![issue]),
        }
    }

    /// Static fallback payload for a version
    #[inline]
    #[must_use]
    pub fn fallback(&self, version: SchemaVersion) -> Value {
        fallback::payload(version)
    }

    /// Schema node describing the value at `path`
    #[must_use]
    pub fn node_at(&self, version: SchemaVersion, path: &FieldPath) -> Option<&Value> {
        let mut node = self.document(version);
        for segment in path.segments() {
            node = match segment {
                Segment::Key(key) => node.get("properties")?.get(key)?,
                Segment::Index(_) => node.get("items")?,
            };
        }
        Some(node)
    }

    /// Declared JSON type of the value at `path`
    #[must_use]
    pub fn expected_type(&self, version: SchemaVersion, path: &FieldPath) -> Option<&str> {
        self.node_at(version, path)?.get("type")?.as_str()
    }

    /// Allowed enum values at `path`
    #[must_use]
    pub fn enum_domain(&self, version: SchemaVersion, path: &FieldPath) -> Option<Vec<&str>> {
        let options = self.node_at(version, path)?.get("enum")?.as_array()?;
        Some(options.iter().filter_map(Value::as_str).collect())
    }

    /// Array length bounds at `path`
    #[must_use]
    pub fn array_bounds(&self, version: SchemaVersion, path: &FieldPath) -> Option<ArrayBounds> {
        let node = self.node_at(version, path)?;
        let read = |key: &str| {
            node.get(key)
                .and_then(Value::as_u64)
                .and_then(|n| usize::try_from(n).ok())
        };
        let bounds = ArrayBounds {
            min: read("minItems"),
            max: read("maxItems"),
        };
        (bounds.min.is_some() || bounds.max.is_some()).then_some(bounds)
    }

    fn issue_from(
        &self,
        version: SchemaVersion,
        payload: &Value,
        error: &ValidationError<'_>,
    ) -> ValidationIssue {
        let at = FieldPath::from_pointer(&error.instance_path.to_string(), payload);

        match &error.kind {
            ValidationErrorKind::Required { property } => {
                let name = property
                    .as_str()
                    .map_or_else(|| property.to_string(), str::to_string);
                ValidationIssue::new(
                    at.key(name),
                    ErrorKind::MissingField,
                    "required field is missing",
                )
            }
            ValidationErrorKind::Type { .. } => {
                let expected = self.expected_type(version, &at).unwrap_or("a different type");
                let detail = format!("expected {expected}, found {}", type_name(&error.instance));
                ValidationIssue::new(at, ErrorKind::WrongType, detail)
            }
            ValidationErrorKind::Enum { .. } => {
                let domain = self
                    .enum_domain(version, &at)
                    .map(|d| d.join(", "))
                    .unwrap_or_default();
                let detail = format!("must be one of: {domain}; found {}", error.instance);
                ValidationIssue::new(at, ErrorKind::InvalidEnum, detail)
            }
            ValidationErrorKind::MinItems { .. } | ValidationErrorKind::MaxItems { .. } => {
                let found = error.instance.as_array().map_or(0, Vec::len);
                let detail = match self.array_bounds(version, &at) {
                    Some(bounds) => format!("{}, found {found}", bounds.describe()),
                    None => error.to_string(),
                };
                ValidationIssue::new(at, ErrorKind::OutOfRange, detail)
            }
            other => ValidationIssue::new(at, kind_of(other), error.to_string()),
        }
    }
}

/// Taxonomy kind for a validator finding
///
/// Only a `type` failure is a wrong type. Single-value constraints count as
/// enum violations; every other keyword rejects a value of the right type and
/// is out of range.
fn kind_of(kind: &ValidationErrorKind) -> ErrorKind {
    match kind {
        ValidationErrorKind::Type { .. } => ErrorKind::WrongType,
        ValidationErrorKind::Required { .. } => ErrorKind::MissingField,
        ValidationErrorKind::Enum { .. } | ValidationErrorKind::Constant { .. } => {
            ErrorKind::InvalidEnum
        }
        // lengths, numeric bounds, patterns, formats, item and property
        // constraints, and composite keywords
        _ => ErrorKind::OutOfRange,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
