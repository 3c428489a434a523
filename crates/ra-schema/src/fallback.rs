//! Static fallback payloads
//!
//! Returned when the retry budget is exhausted. The content is fixed
//! placeholder text, never derived from generator output, and always
//! satisfies its schema version.

use crate::documents::{ACTION_ITEMS_BOUNDS, CHECKLIST_BOUNDS, RELATED_WORKS_BOUNDS};
use crate::mode::SchemaVersion;
use crate::FALLBACK_MARKER;
use serde_json::{json, Value};

const FALLBACK_NOTES: &str =
    "No schema-valid output was produced within the retry budget; consult the trace for the recorded attempts.";

/// Fallback payload for a schema version
#[must_use]
pub fn payload(version: SchemaVersion) -> Value {
    let related_works: Vec<Value> = (0..RELATED_WORKS_BOUNDS.0)
        .map(|_| {
            json!({
                "title": "Additional related work needed",
                "year": 0,
                "url": "",
                "key_contribution": "Not provided.",
                "relevance_reason": ""
            })
        })
        .collect();

    let checklist: Vec<Value> = (0..CHECKLIST_BOUNDS.0)
        .map(|_| {
            json!({
                "task": "Add missing reproduction step",
                "why": "Required to reproduce results"
            })
        })
        .collect();

    let action_items: Vec<Value> = (0..ACTION_ITEMS_BOUNDS.0)
        .map(|_| {
            json!({
                "action": "Define next action item",
                "priority": "low"
            })
        })
        .collect();

    let mut out = json!({
        "related_works": related_works,
        "reproduction_checklist": checklist,
        "action_items": action_items,
        "quality": {
            "schema_valid": true,
            "self_checks": [FALLBACK_MARKER],
            "notes": FALLBACK_NOTES
        }
    });

    if version == SchemaVersion::PdfV1 {
        out["target_paper"] = json!({
            "title": "",
            "main_idea": "",
            "method": "",
            "experiment_setup": [],
            "limitations": []
        });
    }

    out
}
