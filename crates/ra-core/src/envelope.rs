//! Payload envelope
//!
//! Stamps the run identity onto the accepted payload before it is returned.
//! Only `trace_id`, `input` and `quality` are touched, and only with values
//! the schema accepts, so a valid payload stays valid.

use ra_coerce::RepairKind;
use ra_schema::{SchemaVersion, FALLBACK_MARKER};
use ra_trace::{FinalStatus, TraceId};
use serde_json::{Map, Value};

/// Marker recording the schema version a payload was validated against
#[must_use]
pub fn schema_marker(version: SchemaVersion) -> String {
    format!("schema:{}", version.name())
}

/// Marker recording one applied repair
#[must_use]
pub fn repair_marker(repair: RepairKind) -> String {
    format!("coerced:{repair}")
}

/// Stamp `payload` with the run's identity and self-check markers
#[must_use]
pub fn stamp(
    mut payload: Value,
    trace_id: TraceId,
    input_summary: &Value,
    version: SchemaVersion,
    status: FinalStatus,
    repairs: &[RepairKind],
) -> Value {
    let Some(root) = payload.as_object_mut() else {
        return payload;
    };
    root.insert("trace_id".into(), Value::String(trace_id.to_string()));
    root.insert("input".into(), input_summary.clone());

    let quality = root
        .entry("quality")
        .or_insert_with(|| Value::Object(Map::new()));
    if !quality.is_object() {
        *quality = Value::Object(Map::new());
    }
    if let Some(quality) = quality.as_object_mut() {
        quality.insert("schema_valid".into(), Value::Bool(true));

        let checks = quality
            .entry("self_checks")
            .or_insert_with(|| Value::Array(Vec::new()));
        if !checks.is_array() {
            *checks = Value::Array(Vec::new());
        }
        if let Some(checks) = checks.as_array_mut() {
            let mut markers = vec![schema_marker(version)];
            markers.extend(repairs.iter().map(|r| repair_marker(*r)));
            if status == FinalStatus::Fallback {
                markers.push(FALLBACK_MARKER.to_string());
            }
            for marker in markers {
                if !checks.iter().any(|c| c.as_str() == Some(marker.as_str())) {
                    checks.push(Value::String(marker));
                }
            }
        }
    }
    payload
}
