//! End-to-end runs through the orchestrator with scripted generators

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use ra_core::{
    open_recorder, GenerationError, Generator, PipelineConfig, RunInput, RunOrchestrator,
    ScriptedGenerator,
};
use ra_coerce::RepairKind;
use ra_schema::{ErrorKind, SchemaRegistry, SchemaVersion};
use ra_test_utils::{
    pdf_payload, raw, topic_payload, with_action_items, with_priority, with_related_works, without,
    wrap_in_prose,
};
use ra_trace::{AttemptOutcome, FinalStatus, PromptVariant, TraceRecorder};
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(generator: Arc<ScriptedGenerator>) -> RunOrchestrator {
    RunOrchestrator::new(
        PipelineConfig::new(),
        generator,
        Arc::new(TraceRecorder::in_memory()),
    )
    .unwrap()
}

fn schema_valid(payload: &serde_json::Value, version: SchemaVersion) -> bool {
    SchemaRegistry::new().unwrap().validate(payload, version).is_valid()
}

#[tokio::test]
async fn valid_output_is_validated_in_one_attempt() {
    for n in 3..=5 {
        let payload = with_related_works(&topic_payload(), n);
        let generator = Arc::new(ScriptedGenerator::always(raw(&payload)));
        let orch = orchestrator(Arc::clone(&generator));

        let out = orch.execute(RunInput::topic("contrastive learning")).await.unwrap();
        assert_eq!(out.status, FinalStatus::Validated);
        assert_eq!(out.attempts, 1);

        let trace = orch.trace(&out.trace_id).unwrap();
        assert_eq!(trace.attempts.len(), generator.calls());
        assert!(trace.attempts[0].coercion_applied.is_empty());
        assert!(trace.attempts[0].validation_errors.is_empty());
        assert_eq!(out.payload["related_works"], payload["related_works"]);
        assert_eq!(out.payload["trace_id"], out.trace_id.to_string());
    }
}

#[tokio::test]
async fn enum_casing_is_coerced_within_one_attempt() {
    let generator = Arc::new(ScriptedGenerator::always(raw(&with_priority(
        &topic_payload(),
        1,
        "High",
    ))));
    let orch = orchestrator(Arc::clone(&generator));

    let out = orch.execute(RunInput::topic("sparse attention")).await.unwrap();
    assert_eq!(out.status, FinalStatus::Coerced);
    assert_eq!(out.payload["action_items"][1]["priority"], "high");
    assert_eq!(generator.calls(), 1);

    let checks = out.payload["quality"]["self_checks"].as_array().unwrap();
    assert!(checks.iter().any(|c| c == "coerced:normalize_enums"));
    assert!(schema_valid(&out.payload, SchemaVersion::TopicV1));
}

#[tokio::test]
async fn prose_wrapped_output_is_coerced() {
    let generator = Arc::new(ScriptedGenerator::always(wrap_in_prose(&raw(&topic_payload()))));
    let orch = orchestrator(generator);
    let out = orch.execute(RunInput::topic("t")).await.unwrap();
    assert_eq!(out.status, FinalStatus::Coerced);
    let trace = orch.trace(&out.trace_id).unwrap();
    assert_eq!(trace.attempts[0].raw_output, wrap_in_prose(&raw(&topic_payload())));
}

#[tokio::test]
async fn garbage_output_falls_back_after_budget() {
    let generator = Arc::new(ScriptedGenerator::always("not json at all"));
    let orch = orchestrator(Arc::clone(&generator));

    let out = orch.execute(RunInput::topic("graph neural networks")).await.unwrap();
    assert_eq!(out.status, FinalStatus::Fallback);
    assert!(schema_valid(&out.payload, SchemaVersion::TopicV1));
    let checks = out.payload["quality"]["self_checks"].as_array().unwrap();
    assert!(checks.iter().any(|c| c == "fallback_used"));

    let trace = orch.trace(&out.trace_id).unwrap();
    let outcomes: Vec<_> = trace.attempts.iter().map(|a| a.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            AttemptOutcome::RetryableFailure,
            AttemptOutcome::RetryableFailure,
            AttemptOutcome::TerminalFailure,
        ]
    );
    assert_eq!(generator.calls(), 3);
    for (i, attempt) in trace.attempts.iter().enumerate() {
        assert_eq!(attempt.attempt_index as usize, i);
        assert_eq!(attempt.raw_output, "not json at all");
        assert_eq!(attempt.validation_errors[0].kind, ErrorKind::MalformedJson);
    }
    assert!(generator.prompts()[1].contains("VALIDATION ERRORS"));
    assert_eq!(trace.final_payload.as_ref(), Some(&out.payload));
}

#[tokio::test]
async fn missing_quality_triggers_one_named_retry() {
    let generator = Arc::new(ScriptedGenerator::from_outputs([
        raw(&without(&topic_payload(), "quality")),
        raw(&topic_payload()),
    ]));
    let orch = orchestrator(Arc::clone(&generator));

    let out = orch.execute(RunInput::topic("protein folding")).await.unwrap();
    assert_eq!(out.status, FinalStatus::Validated);

    let trace = orch.trace(&out.trace_id).unwrap();
    assert_eq!(trace.attempts.len(), 2);
    assert_eq!(trace.attempts[0].outcome, AttemptOutcome::RetryableFailure);
    assert_eq!(trace.attempts[0].validation_errors.len(), 1);
    assert_eq!(trace.attempts[0].validation_errors[0].kind, ErrorKind::MissingField);
    assert_eq!(trace.attempts[1].prompt_variant, PromptVariant::Corrective);

    let retry_prompt = &generator.prompts()[1];
    assert!(retry_prompt.contains("the field `quality` is missing"));
}

#[tokio::test]
async fn prose_wrapped_output_missing_quality_is_retried_by_name() {
    let generator = Arc::new(ScriptedGenerator::from_outputs([
        format!("Sure! {} hope this helps", raw(&without(&topic_payload(), "quality"))),
        raw(&topic_payload()),
    ]));
    let orch = orchestrator(Arc::clone(&generator));

    let out = orch.execute(RunInput::topic("speculative decoding")).await.unwrap();
    assert_eq!(out.status, FinalStatus::Validated);

    let trace = orch.trace(&out.trace_id).unwrap();
    let first = &trace.attempts[0];
    assert_eq!(first.outcome, AttemptOutcome::RetryableFailure);
    assert_eq!(first.coercion_applied, vec![RepairKind::StripProse]);
    assert_eq!(first.validation_errors[0].kind, ErrorKind::MissingField);
    assert_eq!(first.validation_errors[0].path.to_string(), "quality");

    let retry_prompt = &generator.prompts()[1];
    assert!(retry_prompt.contains("the field `quality` is missing"));
    assert!(!retry_prompt.contains("not valid JSON"));
}

#[tokio::test]
async fn short_pdf_action_items_are_retried_not_padded() {
    let generator = Arc::new(ScriptedGenerator::from_outputs([
        raw(&with_action_items(&pdf_payload(), 4)),
        raw(&pdf_payload()),
    ]));
    let orch = orchestrator(Arc::clone(&generator));

    let out = orch
        .execute(RunInput::pdf("transformer.pdf", "[PAGE 1] We propose the Transformer"))
        .await
        .unwrap();
    assert_eq!(out.status, FinalStatus::Validated);

    let trace = orch.trace(&out.trace_id).unwrap();
    let first = &trace.attempts[0];
    assert!(first.coercion_applied.is_empty());
    assert_eq!(first.validation_errors[0].kind, ErrorKind::OutOfRange);
    assert_eq!(first.validation_errors[0].path.to_string(), "action_items");
    assert!(generator.prompts()[1].contains("must contain exactly 5 items, found 4"));
    assert!(schema_valid(&out.payload, SchemaVersion::PdfV1));
}

#[tokio::test]
async fn generation_failures_consume_budget() {
    let generator = Arc::new(ScriptedGenerator::new([Err(GenerationError::Timeout {
        secs: 30,
    })]));
    let orch = RunOrchestrator::new(
        PipelineConfig::new().with_max_attempts(2),
        Arc::clone(&generator) as Arc<dyn Generator>,
        Arc::new(TraceRecorder::in_memory()),
    )
    .unwrap();

    let out = orch.execute(RunInput::topic("t")).await.unwrap();
    assert_eq!(out.status, FinalStatus::Fallback);
    assert_eq!(generator.calls(), 2);

    let trace = orch.trace(&out.trace_id).unwrap();
    for attempt in &trace.attempts {
        assert_eq!(attempt.raw_output, "");
        assert_eq!(attempt.validation_errors[0].kind, ErrorKind::GenerationError);
    }
}

/// Returns invalid output once, then never answers
#[derive(Debug, Default)]
struct StallingGenerator {
    calls: parking_lot::Mutex<usize>,
}

#[async_trait]
impl Generator for StallingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        let first = {
            let mut calls = self.calls.lock();
            *calls += 1;
            *calls == 1
        };
        if first {
            Ok("{\"related_works\": []}".to_string())
        } else {
            futures::future::pending().await
        }
    }
}

#[tokio::test]
async fn abandoned_run_leaves_partial_trace() {
    let recorder = Arc::new(TraceRecorder::in_memory());
    let orch = RunOrchestrator::new(
        PipelineConfig::new(),
        Arc::new(StallingGenerator::default()),
        Arc::clone(&recorder),
    )
    .unwrap();

    let result = tokio::time::timeout(
        Duration::from_millis(200),
        orch.execute(RunInput::topic("t")),
    )
    .await;
    assert!(result.is_err(), "run should still be waiting on the generator");

    let ids = recorder.trace_ids();
    assert_eq!(ids.len(), 1);
    let trace = recorder.get(&ids[0]).unwrap();
    assert_eq!(trace.attempts.len(), 1);
    assert_eq!(trace.attempts[0].outcome, AttemptOutcome::RetryableFailure);
    assert_eq!(trace.final_status, None);
    assert_eq!(trace.final_payload, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_runs_keep_separate_traces() {
    let generator = Arc::new(ScriptedGenerator::always(raw(&topic_payload())));
    let orch = Arc::new(orchestrator(generator));

    let handles: Vec<_> = (0..24)
        .map(|i| {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.execute(RunInput::topic(format!("topic {i}"))).await })
        })
        .collect();

    let mut ids = std::collections::HashSet::new();
    for (i, handle) in handles.into_iter().enumerate() {
        let out = handle.await.unwrap().unwrap();
        let trace = orch.trace(&out.trace_id).unwrap();
        assert_eq!(trace.input_summary["topic"], format!("topic {i}"));
        assert_eq!(out.payload["input"]["topic"], format!("topic {i}"));
        assert_eq!(trace.attempts.len(), 1);
        assert!(ids.insert(out.trace_id));
    }
    assert_eq!(orch.recorder().len(), 24);
}

#[tokio::test]
async fn journaled_trace_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new().with_trace_dir(dir.path());

    let trace_id = {
        let recorder = Arc::new(open_recorder(&config).unwrap());
        let orch = RunOrchestrator::new(
            config.clone(),
            Arc::new(ScriptedGenerator::from_outputs([
                raw(&without(&topic_payload(), "quality")),
                raw(&topic_payload()),
            ])),
            recorder,
        )
        .unwrap();
        orch.execute(RunInput::topic("t")).await.unwrap().trace_id
    };

    let recorder = open_recorder(&config).unwrap();
    let trace = recorder.get(&trace_id).unwrap();
    assert_eq!(trace.attempts.len(), 2);
    assert_eq!(trace.final_status, Some(FinalStatus::Validated));
    assert!(dir.path().join(format!("{trace_id}.jsonl")).exists());
}
