use std::process::ExitCode;

use soccer_ingest::cli;
use soccer_ingest::config::DataPaths;
use soccer_ingest::snapshot::SnapshotStore;
use soccer_ingest::sources::football_data_csv;

fn main() -> ExitCode {
    cli::run("football_data_pull", || {
        football_data_csv::run(&SnapshotStore::new(DataPaths::from_env().raw))
    })
}
