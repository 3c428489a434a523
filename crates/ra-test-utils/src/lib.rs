//! Testing utilities for the research agent workspace
//!
//! Canonical generator payloads and small mutators for building the
//! defective variants exercised by validation, coercion and retry tests.

#![allow(missing_docs)]

use serde_json::{json, Value};

pub fn topic_payload() -> Value {
    json!({
        "related_works": [
            {
                "title": "Attention Is All You Need",
                "year": 2017,
                "url": "https://arxiv.org/abs/1706.03762",
                "key_contribution": "Introduces the Transformer architecture."
            },
            {
                "title": "BERT: Pre-training of Deep Bidirectional Transformers",
                "year": 2018,
                "url": "https://arxiv.org/abs/1810.04805",
                "key_contribution": "Masked language model pre-training.",
                "relevance_reason": "Canonical encoder baseline."
            },
            {
                "title": "Language Models are Few-Shot Learners",
                "year": 2020,
                "url": "https://arxiv.org/abs/2005.14165",
                "key_contribution": "Scaling enables in-context learning."
            }
        ],
        "reproduction_checklist": (1..=5)
            .map(|i| json!({"task": format!("Step {i}"), "why": "Required to reproduce results"}))
            .collect::<Vec<_>>(),
        "action_items": (["high", "high", "medium", "medium", "low"]
            .iter()
            .enumerate()
            .map(|(i, p)| json!({"action": format!("Action {}", i + 1), "priority": p}))
            .collect::<Vec<_>>()),
        "quality": {
            "schema_valid": true,
            "self_checks": ["relevance_ranked"]
        }
    })
}

pub fn pdf_payload() -> Value {
    let mut payload = topic_payload();
    payload["target_paper"] = json!({
        "title": "Attention Is All You Need",
        "main_idea": "Replace recurrence with self-attention.",
        "method": "Encoder-decoder built from stacked attention layers.",
        "experiment_setup": [
            {
                "item": "dataset",
                "value": "WMT 2014 English-German",
                "evidence": {"page": 7, "span": "We trained on the standard WMT 2014 English-German dataset"}
            }
        ],
        "limitations": ["Quadratic cost in sequence length"]
    });
    payload
}

pub fn raw(payload: &Value) -> String {
    payload.to_string()
}

pub fn without(payload: &Value, field: &str) -> Value {
    let mut out = payload.clone();
    if let Some(map) = out.as_object_mut() {
        map.remove(field);
    }
    out
}

/// Resize `action_items` to `n` entries, cycling the existing ones.
pub fn with_action_items(payload: &Value, n: usize) -> Value {
    resize(payload, "action_items", n)
}

/// Resize `related_works` to `n` entries, cycling the existing ones.
pub fn with_related_works(payload: &Value, n: usize) -> Value {
    resize(payload, "related_works", n)
}

pub fn with_priority(payload: &Value, index: usize, priority: &str) -> Value {
    let mut out = payload.clone();
    out["action_items"][index]["priority"] = json!(priority);
    out
}

pub fn wrap_in_prose(raw: &str) -> String {
    format!("Sure! Here is the literature review you asked for:\n\n{raw}\n\nLet me know if you need anything else.")
}

fn resize(payload: &Value, field: &str, n: usize) -> Value {
    let mut out = payload.clone();
    let items = out[field].as_array().cloned().unwrap_or_default();
    let resized: Vec<Value> = items.iter().cycle().take(n).cloned().collect();
    out[field] = Value::Array(resized);
    out
}
