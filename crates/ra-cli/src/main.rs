//! `research-agent` binary

use ra_cli::{logging, LogFormat};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = ra_cli::command().get_matches();
    let format = matches
        .get_one::<String>("log-format")
        .and_then(|f| f.parse::<LogFormat>().ok())
        .unwrap_or_default();
    logging::init(format);

    match ra_cli::run(&matches).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
