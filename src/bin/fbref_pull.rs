use std::process::ExitCode;

use soccer_ingest::cli;
use soccer_ingest::config::DataPaths;
use soccer_ingest::snapshot::SnapshotStore;
use soccer_ingest::sources::fbref;

fn main() -> ExitCode {
    cli::run("fbref_pull", || {
        fbref::run(&SnapshotStore::new(DataPaths::from_env().raw))
    })
}
