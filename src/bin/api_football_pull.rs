use std::process::ExitCode;

use soccer_ingest::cli::{self, Outcome};
use soccer_ingest::config::DataPaths;
use soccer_ingest::snapshot::SnapshotStore;
use soccer_ingest::sources::api_football::{ApiFootball, ApiFootballConfig};

fn main() -> ExitCode {
    cli::run("api_football_pull", || {
        let store = SnapshotStore::new(DataPaths::from_env().raw);
        ApiFootball::new(ApiFootballConfig::from_env(), store).run_probe()?;
        Ok(Outcome::Complete)
    })
}
