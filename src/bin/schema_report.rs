use std::process::ExitCode;

use soccer_ingest::cli::{self, Outcome};
use soccer_ingest::config::DataPaths;
use soccer_ingest::probe;

fn main() -> ExitCode {
    cli::run("schema_report", || {
        if probe::run_schema_report(&DataPaths::from_env().raw)? {
            Ok(Outcome::Complete)
        } else {
            Ok(Outcome::Skipped("nothing to report".to_string()))
        }
    })
}
