use std::process::ExitCode;

use soccer_ingest::cli::{self, Outcome};
use soccer_ingest::config::DataPaths;
use soccer_ingest::normalize::api_football;

fn main() -> ExitCode {
    cli::run("stage7_normalize_api_football", || {
        api_football::run(&DataPaths::from_env())?;
        Ok(Outcome::Complete)
    })
}
