use std::process::ExitCode;

use soccer_ingest::cli;
use soccer_ingest::config::DataPaths;
use soccer_ingest::snapshot::SnapshotStore;
use soccer_ingest::sources::statsbomb;

fn main() -> ExitCode {
    cli::run("statsbomb_open_pull", || {
        statsbomb::run(&SnapshotStore::new(DataPaths::from_env().raw))
    })
}
