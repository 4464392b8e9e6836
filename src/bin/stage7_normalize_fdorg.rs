use std::process::ExitCode;

use soccer_ingest::cli::{self, Outcome};
use soccer_ingest::config::DataPaths;
use soccer_ingest::normalize::fdorg;

fn main() -> ExitCode {
    cli::run("stage7_normalize_fdorg", || {
        fdorg::run(&DataPaths::from_env())?;
        Ok(Outcome::Complete)
    })
}
