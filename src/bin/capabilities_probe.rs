use std::process::ExitCode;

use soccer_ingest::cli::{self, Outcome};
use soccer_ingest::config::DataPaths;
use soccer_ingest::probe;

fn main() -> ExitCode {
    cli::run("capabilities_probe", || {
        probe::run_capabilities(&DataPaths::from_env().raw);
        Ok(Outcome::Complete)
    })
}
