//! Research Agent CLI
//!
//! Command-line front end for the pipeline:
//! - `topic` and `pdf` run against the configured chat-completions provider
//! - `replay` feeds a recorded list of raw outputs through the same pipeline
//! - `trace` prints a journaled run record

pub mod cli;
pub mod commands;
pub mod logging;

pub use cli::command;
pub use commands::run;
pub use logging::LogFormat;
