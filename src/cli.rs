use std::process::ExitCode;

use anyhow::Result;

use crate::config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Complete,
    /// Nothing to do or a known-flaky source refused us; still a successful run.
    Skipped(String),
}

pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .try_init();
}

/// Top-level handler shared by every command in `src/bin`.
pub fn run(name: &str, body: impl FnOnce() -> Result<Outcome>) -> ExitCode {
    config::load_dotenv();
    init_logging();
    match body() {
        Ok(Outcome::Complete) => {
            println!("\n✅ {name} complete");
            ExitCode::SUCCESS
        }
        Ok(Outcome::Skipped(reason)) => {
            println!("\n{reason}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("❌ {err:#}");
            log::error!("{name} failed: {err:?}");
            ExitCode::FAILURE
        }
    }
}
