//! Argument definitions

use clap::{value_parser, Arg, Command};
use std::path::PathBuf;

/// Build the `research-agent` command
#[must_use]
pub fn command() -> Command {
    Command::new("research-agent")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Schema-validated literature reviews with self-correcting retries")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML file with pipeline settings"),
        )
        .arg(
            Arg::new("max-attempts")
                .long("max-attempts")
                .global(true)
                .value_parser(value_parser!(u32).range(1..))
                .help("Generator calls allowed per run"),
        )
        .arg(
            Arg::new("trace-dir")
                .long("trace-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory for the JSON-lines trace journal"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log output format on stderr"),
        )
        .subcommand(
            Command::new("topic")
                .about("Find related work and action items for a research topic")
                .arg(Arg::new("topic").required(true).help("Research topic"))
                .arg(
                    Arg::new("candidates")
                        .long("candidates")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON array of candidate papers"),
                ),
        )
        .subcommand(
            Command::new("pdf")
                .about("Summarize extracted paper text")
                .arg(
                    Arg::new("name")
                        .long("name")
                        .default_value("input.pdf")
                        .help("File name reported in the output"),
                )
                .arg(
                    Arg::new("text-file")
                        .long("text-file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Extracted text with [PAGE n] tags"),
                ),
        )
        .subcommand(
            Command::new("replay")
                .about("Run the pipeline against scripted generator outputs")
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .required(true)
                        .value_parser(["topic", "pdf"])
                        .help("Output schema to validate against"),
                )
                .arg(
                    Arg::new("script")
                        .long("script")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON array of raw outputs, or {\"error\": ...} objects"),
                )
                .arg(
                    Arg::new("input")
                        .long("input")
                        .default_value("replay")
                        .help("Topic string or paper text"),
                ),
        )
        .subcommand(
            Command::new("trace")
                .about("Print a journaled run record")
                .arg(Arg::new("trace-id").required(true).help("Trace identifier")),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_is_consistent() {
        command().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let matches = command()
            .try_get_matches_from([
                "research-agent",
                "topic",
                "graph neural networks",
                "--max-attempts",
                "5",
                "--log-format",
                "json",
            ])
            .unwrap();
        assert_eq!(matches.get_one::<u32>("max-attempts"), Some(&5));
        assert_eq!(matches.get_one::<String>("log-format").map(String::as_str), Some("json"));
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "topic");
        assert_eq!(
            sub.get_one::<String>("topic").map(String::as_str),
            Some("graph neural networks")
        );
    }

    #[test]
    fn zero_attempts_rejected_at_parse_time() {
        assert!(command()
            .try_get_matches_from(["research-agent", "topic", "t", "--max-attempts", "0"])
            .is_err());
    }

    #[test]
    fn replay_requires_known_mode() {
        assert!(command()
            .try_get_matches_from(["research-agent", "replay", "--mode", "audio", "--script", "s.json"])
            .is_err());
    }

    #[test]
    fn pdf_name_defaults() {
        let matches = command()
            .try_get_matches_from(["research-agent", "pdf", "--text-file", "paper.txt"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<String>("name").map(String::as_str), Some("input.pdf"));
    }
}
