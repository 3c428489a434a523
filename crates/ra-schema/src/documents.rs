//! Built-in schema documents
//!
//! Both versions share the literature-review body (`related_works`,
//! `reproduction_checklist`, `action_items`, `quality`); `pdf_v1`
//! additionally requires `target_paper`.

use crate::mode::SchemaVersion;
use serde_json::{json, Value};

/// Allowed values of `action_items[].priority`
pub const PRIORITIES: [&str; 3] = ["high", "medium", "low"];

/// Bounds on `related_works`
pub const RELATED_WORKS_BOUNDS: (usize, usize) = (3, 5);

/// Bounds on `reproduction_checklist`
pub const CHECKLIST_BOUNDS: (usize, usize) = (5, 10);

/// Bounds on `action_items`
pub const ACTION_ITEMS_BOUNDS: (usize, usize) = (5, 5);

/// Schema document for a version
#[must_use]
pub fn document(version: SchemaVersion) -> Value {
    let mut required = vec![
        "related_works",
        "reproduction_checklist",
        "action_items",
        "quality",
    ];
    let mut properties = shared_properties();

    if version == SchemaVersion::PdfV1 {
        required.push("target_paper");
        if let Value::Object(map) = &mut properties {
            map.insert("target_paper".to_string(), target_paper());
        }
    }

    json!({
        "$id": format!("urn:research-agent:{}", version.name()),
        "type": "object",
        "required": required,
        "properties": properties,
        "additionalProperties": true
    })
}

fn shared_properties() -> Value {
    json!({
        "trace_id": {"type": "string"},
        "input": {
            "type": "object",
            "required": ["mode"],
            "properties": {
                "mode": {"type": "string", "enum": ["topic", "pdf"]},
                "topic": {"type": "string"},
                "pdf_name": {"type": "string"}
            },
            "additionalProperties": true
        },
        "related_works": {
            "type": "array",
            "minItems": RELATED_WORKS_BOUNDS.0,
            "maxItems": RELATED_WORKS_BOUNDS.1,
            "items": {
                "type": "object",
                "required": ["title", "year", "url", "key_contribution"],
                "properties": {
                    "title": {"type": "string"},
                    "year": {"type": "integer"},
                    "venue": {"type": "string"},
                    "url": {"type": "string"},
                    "key_contribution": {"type": "string"},
                    "relevance_reason": {"type": "string"},
                    "citation": {"type": "string"}
                },
                "additionalProperties": true
            }
        },
        "reproduction_checklist": {
            "type": "array",
            "minItems": CHECKLIST_BOUNDS.0,
            "maxItems": CHECKLIST_BOUNDS.1,
            "items": {
                "type": "object",
                "required": ["task", "why"],
                "properties": {
                    "task": {"type": "string"},
                    "why": {"type": "string"},
                    "evidence": evidence(false)
                },
                "additionalProperties": true
            }
        },
        "action_items": {
            "type": "array",
            "minItems": ACTION_ITEMS_BOUNDS.0,
            "maxItems": ACTION_ITEMS_BOUNDS.1,
            "items": {
                "type": "object",
                "required": ["action", "priority"],
                "properties": {
                    "action": {"type": "string"},
                    "priority": {"type": "string", "enum": PRIORITIES},
                    "owner": {"type": "string"}
                },
                "additionalProperties": true
            }
        },
        "quality": {
            "type": "object",
            "required": ["schema_valid", "self_checks"],
            "properties": {
                "schema_valid": {"type": "boolean"},
                "self_checks": {"type": "array", "items": {"type": "string"}},
                "notes": {"type": "string"}
            },
            "additionalProperties": true
        }
    })
}

fn target_paper() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": {"type": "string"},
            "main_idea": {"type": "string"},
            "method": {"type": "string"},
            "experiment_setup": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["item", "value", "evidence"],
                    "properties": {
                        "item": {"type": "string"},
                        "value": {"type": "string"},
                        "evidence": evidence(true)
                    }
                }
            },
            "limitations": {"type": "array", "items": {"type": "string"}}
        },
        "additionalProperties": true
    })
}

fn evidence(required: bool) -> Value {
    let mut node = json!({
        "type": "object",
        "properties": {
            "page": {"type": "integer"},
            "span": {"type": "string"}
        }
    });
    if required {
        node["required"] = json!(["page", "span"]);
    }
    node
}
