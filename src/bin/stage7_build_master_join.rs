use std::process::ExitCode;

use soccer_ingest::cli::{self, Outcome};
use soccer_ingest::config::DataPaths;
use soccer_ingest::join;

fn main() -> ExitCode {
    cli::run("stage7_build_master_join", || {
        join::run(&DataPaths::from_env())?;
        Ok(Outcome::Complete)
    })
}
