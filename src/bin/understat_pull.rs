use std::process::ExitCode;

use soccer_ingest::cli;
use soccer_ingest::config::DataPaths;
use soccer_ingest::snapshot::SnapshotStore;
use soccer_ingest::sources::understat;

fn main() -> ExitCode {
    cli::run("understat_pull", || {
        understat::run(&SnapshotStore::new(DataPaths::from_env().raw))
    })
}
