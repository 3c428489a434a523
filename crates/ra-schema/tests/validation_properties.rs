//! Property tests for schema validation.
//!
//! Validation is pure and deterministic: the same payload always yields the
//! same result, and validating never mutates its input.

use proptest::prelude::*;
use ra_schema::{ErrorKind, SchemaRegistry, SchemaVersion};
use ra_test_utils::{pdf_payload, raw, topic_payload, with_action_items, with_priority};
use serde_json::json;

fn version_strategy() -> impl Strategy<Value = SchemaVersion> {
    prop_oneof![Just(SchemaVersion::TopicV1), Just(SchemaVersion::PdfV1)]
}

proptest! {
    #[test]
    fn prop_validate_is_idempotent(
        version in version_strategy(),
        actions in 0usize..9,
        priority in "[a-zA-Z]{1,8}",
        year in any::<i64>(),
    ) {
        let registry = SchemaRegistry::new().unwrap();
        let mut payload = with_priority(&with_action_items(&pdf_payload(), actions.max(1)), 0, &priority);
        payload["related_works"][0]["year"] = json!(year.to_string());
        let snapshot = payload.clone();

        let first = registry.validate(&payload, version);
        let second = registry.validate(&payload, version);

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(payload, snapshot);
    }

    #[test]
    fn prop_arbitrary_text_never_panics(text in ".{0,200}") {
        let registry = SchemaRegistry::new().unwrap();
        let first = registry.validate_text(&text, SchemaVersion::TopicV1);
        let second = registry.validate_text(&text, SchemaVersion::TopicV1);
        prop_assert_eq!(first, second);
    }
}

#[test]
fn text_and_value_validation_agree() {
    let registry = SchemaRegistry::new().unwrap();
    let payload = with_action_items(&topic_payload(), 3);
    assert_eq!(
        registry.validate_text(&raw(&payload), SchemaVersion::TopicV1),
        registry.validate(&payload, SchemaVersion::TopicV1)
    );
}

#[test]
fn every_issue_kind_is_reachable() {
    let registry = SchemaRegistry::new().unwrap();
    let mut payload = with_priority(&with_action_items(&topic_payload(), 2), 0, "urgent");
    payload["related_works"][0]["year"] = json!("unknown");
    payload.as_object_mut().unwrap().remove("quality");

    let result = registry.validate(&payload, SchemaVersion::TopicV1);
    for kind in [
        ErrorKind::MissingField,
        ErrorKind::WrongType,
        ErrorKind::OutOfRange,
        ErrorKind::InvalidEnum,
    ] {
        assert!(result.has_kind(kind), "missing {kind}");
    }
    assert!(registry
        .validate_text("{", SchemaVersion::TopicV1)
        .has_kind(ErrorKind::MalformedJson));
}
