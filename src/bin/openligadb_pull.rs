use std::process::ExitCode;

use soccer_ingest::cli;
use soccer_ingest::config::DataPaths;
use soccer_ingest::snapshot::SnapshotStore;
use soccer_ingest::sources::openligadb;

fn main() -> ExitCode {
    cli::run("openligadb_pull", || {
        openligadb::run(&SnapshotStore::new(DataPaths::from_env().raw))
    })
}
