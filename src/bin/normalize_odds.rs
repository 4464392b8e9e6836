use std::process::ExitCode;

use soccer_ingest::cli;
use soccer_ingest::config::DataPaths;
use soccer_ingest::normalize::odds_canonical;
use soccer_ingest::snapshot::SnapshotStore;

fn main() -> ExitCode {
    cli::run("normalize_odds", || {
        let paths = DataPaths::from_env();
        odds_canonical::run(&paths.raw, &SnapshotStore::new(&paths.raw))
    })
}
