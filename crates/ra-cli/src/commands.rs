//! Subcommand handlers

use anyhow::{bail, Context};
use clap::ArgMatches;
use ra_core::{
    open_recorder, CandidatePaper, GenerationError, Generator, PipelineConfig, RunInput,
    RunOrchestrator, RunOutput, ScriptedGenerator,
};
use ra_openai::{OpenAiConfig, OpenAiGenerator};
use ra_trace::{TraceId, TraceJournal, TraceRecorder};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Run the selected subcommand and return the text to print on stdout
///
/// # Errors
/// Returns an error for unreadable files, invalid configuration, or a run
/// that could not be started or recorded.
pub async fn run(matches: &ArgMatches) -> anyhow::Result<String> {
    let config = resolve_config(matches)?;
    match matches.subcommand() {
        Some(("topic", args)) => {
            let mut input = RunInput::topic(required(args, "topic")?);
            if let Some(path) = args.get_one::<PathBuf>("candidates") {
                input = input.with_candidates(read_candidates(path)?);
            }
            let out = execute(config, provider()?, input).await?;
            pretty(&out.payload)
        }
        Some(("pdf", args)) => {
            let path = args
                .get_one::<PathBuf>("text-file")
                .context("--text-file is required")?;
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let input = RunInput::pdf(required(args, "name")?, text);
            let out = execute(config, provider()?, input).await?;
            pretty(&out.payload)
        }
        Some(("replay", args)) => {
            let script = args
                .get_one::<PathBuf>("script")
                .context("--script is required")?;
            let generator = Arc::new(read_script(script)?);
            let input = RunInput::from_mode(required(args, "mode")?, required(args, "input")?)?;
            let recorder = Arc::new(open_recorder(&config)?);
            let orchestrator = RunOrchestrator::new(config, generator, recorder)?;
            let out = orchestrator.execute(input).await?;
            let record = orchestrator.trace(&out.trace_id)?;
            pretty(&json!({ "payload": out.payload, "trace": &*record }))
        }
        Some(("trace", args)) => {
            let trace_id: TraceId = required(args, "trace-id")?
                .parse()
                .context("trace id must be a UUID")?;
            let dir = config
                .trace_dir
                .as_deref()
                .context("no trace directory; pass --trace-dir or set TRACE_DIR")?;
            let recorder = TraceRecorder::with_journal(TraceJournal::open(dir)?);
            let record = recorder.get(&trace_id)?;
            pretty(&*record)
        }
        Some((other, _)) => bail!("unknown subcommand: {other}"),
        None => bail!("no subcommand given"),
    }
}

/// File config, then environment, then command-line flags
fn resolve_config(matches: &ArgMatches) -> anyhow::Result<PipelineConfig> {
    let base = match matches.get_one::<PathBuf>("config") {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::new(),
    };
    let mut config = base.apply_env().context("applying environment overrides")?;
    if let Some(max_attempts) = matches.get_one::<u32>("max-attempts") {
        config.max_attempts = *max_attempts;
    }
    if let Some(dir) = matches.get_one::<PathBuf>("trace-dir") {
        config.trace_dir = Some(dir.clone());
    }
    config.validate()?;
    Ok(config)
}

fn provider() -> anyhow::Result<Arc<dyn Generator>> {
    let config = OpenAiConfig::from_env()?;
    Ok(Arc::new(OpenAiGenerator::new(config)?))
}

async fn execute(
    config: PipelineConfig,
    generator: Arc<dyn Generator>,
    input: RunInput,
) -> anyhow::Result<RunOutput> {
    let recorder = Arc::new(open_recorder(&config)?);
    let orchestrator = RunOrchestrator::new(config, generator, recorder)?;
    let out = orchestrator.execute(input).await?;
    tracing::info!(trace_id = %out.trace_id, "fetch attempts with `research-agent trace {}`", out.trace_id);
    Ok(out)
}

fn required<'a>(args: &'a ArgMatches, id: &str) -> anyhow::Result<&'a str> {
    args.get_one::<String>(id)
        .map(String::as_str)
        .with_context(|| format!("missing argument `{id}`"))
}

fn read_candidates(path: &Path) -> anyhow::Result<Vec<CandidatePaper>> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing candidates in {}", path.display()))
}

/// Script entries are raw output strings or `{"error": "..."}` objects
fn read_script(path: &Path) -> anyhow::Result<ScriptedGenerator> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let entries: Vec<Value> =
        serde_json::from_str(&text).with_context(|| format!("parsing script {}", path.display()))?;
    if entries.is_empty() {
        bail!("script {} has no entries", path.display());
    }
    let steps = entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| match entry {
            Value::String(output) => Ok(Ok(output)),
            Value::Object(obj) => match obj.get("error").and_then(Value::as_str) {
                Some(msg) => Ok(Err(GenerationError::Transport(msg.to_string()))),
                None => bail!("script entry {i} is an object without an `error` string"),
            },
            other => bail!("script entry {i} must be a string, found {other}"),
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(ScriptedGenerator::new(steps))
}

fn pretty<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
