//! Individual repair passes
//!
//! Every structural pass works on a copy of the payload and either returns the
//! fully repaired copy or leaves the input untouched; a pass never commits a
//! partial rewrite.

use ra_schema::{ErrorKind, FieldPath, SchemaRegistry, SchemaVersion, ValidationIssue};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt::{self, Display, Formatter};

/// Named repair operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairKind {
    /// Remove prose surrounding the JSON document
    StripProse,
    /// Convert numeric-looking strings to numbers
    CoerceNumbers,
    /// Match enum values case-insensitively
    NormalizeEnums,
    /// Truncate arrays longer than their upper bound
    TruncateArrays,
}

impl RepairKind {
    /// Structural passes, in application order
    pub const STRUCTURAL: [RepairKind; 3] = [
        RepairKind::CoerceNumbers,
        RepairKind::NormalizeEnums,
        RepairKind::TruncateArrays,
    ];

    /// Snake-case name of the repair
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RepairKind::StripProse => "strip_prose",
            RepairKind::CoerceNumbers => "coerce_numbers",
            RepairKind::NormalizeEnums => "normalize_enums",
            RepairKind::TruncateArrays => "truncate_arrays",
        }
    }

    /// Run a structural pass over `payload`
    ///
    /// [`RepairKind::StripProse`] works on text, not on a parsed payload, and
    /// is always [`PassResult::NotApplicable`] here.
    #[must_use]
    pub fn apply(
        self,
        payload: &Value,
        issues: &[ValidationIssue],
        registry: &SchemaRegistry,
        version: SchemaVersion,
    ) -> PassResult {
        match self {
            RepairKind::StripProse => PassResult::NotApplicable,
            RepairKind::CoerceNumbers => coerce_numbers(payload, issues, registry, version),
            RepairKind::NormalizeEnums => normalize_enums(payload, issues, registry, version),
            RepairKind::TruncateArrays => truncate_arrays(payload, issues, registry, version),
        }
    }
}

impl Display for RepairKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single pass
#[derive(Debug, Clone, PartialEq)]
pub enum PassResult {
    /// The pass rewrote the payload
    Applied(Value),
    /// Nothing this pass knows how to fix
    NotApplicable,
    /// A target could not be repaired unambiguously; payload untouched
    Failed(String),
}

/// Slice the JSON document out of surrounding prose
///
/// Each `{` or `[` is tried in order as the start of a document whose end is
/// found by parsing, so brackets in the surrounding prose are ignored. The
/// first complete object wins; a complete array is used only when no object
/// parses. Returns `None` if no document parses or nothing would be removed.
#[must_use]
pub fn strip_prose(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let mut first_array = None;
    for (start, opener) in trimmed
        .char_indices()
        .filter(|(_, c)| matches!(c, '{' | '['))
    {
        let Some(len) = document_len(&trimmed[start..]) else {
            continue;
        };
        let span = &trimmed[start..start + len];
        if opener == '{' {
            return (span.len() < trimmed.len()).then_some(span);
        }
        first_array.get_or_insert(span);
    }
    first_array.filter(|span| span.len() < trimmed.len())
}

/// Byte length of the JSON value at the start of `text`
fn document_len(text: &str) -> Option<usize> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    match stream.next() {
        Some(Ok(_)) => Some(stream.byte_offset()),
        _ => None,
    }
}

fn coerce_numbers(
    payload: &Value,
    issues: &[ValidationIssue],
    registry: &SchemaRegistry,
    version: SchemaVersion,
) -> PassResult {
    let mut targets = Vec::new();
    for issue in issues.iter().filter(|i| i.kind == ErrorKind::WrongType) {
        let Some(expected) = registry.expected_type(version, &issue.path) else {
            continue;
        };
        if !matches!(expected, "integer" | "number") {
            continue;
        }
        if let Some(Value::String(text)) = issue.path.lookup(payload) {
            targets.push((issue.path.clone(), expected == "integer", text.clone()));
        }
    }
    if targets.is_empty() {
        return PassResult::NotApplicable;
    }

    let mut out = payload.clone();
    for (path, integer, text) in targets {
        let Some(number) = parse_number(&text, integer) else {
            return PassResult::Failed(format!("{path}: {text:?} is not numeric"));
        };
        match path.lookup_mut(&mut out) {
            Some(slot) => *slot = Value::Number(number),
            None => return PassResult::Failed(format!("{path}: target vanished")),
        }
    }
    PassResult::Applied(out)
}

fn parse_number(text: &str, integer: bool) -> Option<Number> {
    let text = text.trim();
    if integer {
        return text.parse::<i64>().ok().map(Number::from);
    }
    if let Ok(n) = text.parse::<i64>() {
        return Some(Number::from(n));
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}

fn normalize_enums(
    payload: &Value,
    issues: &[ValidationIssue],
    registry: &SchemaRegistry,
    version: SchemaVersion,
) -> PassResult {
    let targets: Vec<&FieldPath> = issues
        .iter()
        .filter(|i| i.kind == ErrorKind::InvalidEnum)
        .map(|i| &i.path)
        .collect();
    if targets.is_empty() {
        return PassResult::NotApplicable;
    }

    let mut out = payload.clone();
    for path in targets {
        let domain = registry.enum_domain(version, path).unwrap_or_default();
        let Some(Value::String(current)) = path.lookup(&out) else {
            return PassResult::Failed(format!("{path}: enum value is not a string"));
        };
        let wanted = current.trim();
        let Some(matched) = domain.iter().find(|opt| opt.eq_ignore_ascii_case(wanted)) else {
            return PassResult::Failed(format!("{path}: {current:?} matches no allowed value"));
        };
        let matched = (*matched).to_string();
        if let Some(slot) = path.lookup_mut(&mut out) {
            *slot = Value::String(matched);
        }
    }
    PassResult::Applied(out)
}

fn truncate_arrays(
    payload: &Value,
    issues: &[ValidationIssue],
    registry: &SchemaRegistry,
    version: SchemaVersion,
) -> PassResult {
    let mut targets: Vec<(&FieldPath, usize)> = issues
        .iter()
        .filter(|i| i.kind == ErrorKind::OutOfRange)
        .filter_map(|i| {
            let max = registry.array_bounds(version, &i.path)?.max?;
            let len = i.path.lookup(payload)?.as_array()?.len();
            (len > max).then_some((&i.path, max))
        })
        .collect();
    if targets.is_empty() {
        return PassResult::NotApplicable;
    }

    // Deepest first so an outer truncation cannot shift an inner target.
    targets.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = payload.clone();
    for (path, max) in targets {
        if let Some(Value::Array(items)) = path.lookup_mut(&mut out) {
            items.truncate(max);
        }
    }
    PassResult::Applied(out)
}
