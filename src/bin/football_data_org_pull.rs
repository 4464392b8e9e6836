use std::process::ExitCode;

use soccer_ingest::cli::{self, Outcome};
use soccer_ingest::config::DataPaths;
use soccer_ingest::snapshot::SnapshotStore;
use soccer_ingest::sources::football_data_org::{FdOrg, FdOrgConfig, PULL_SOURCE};

fn main() -> ExitCode {
    cli::run("football_data_org_pull", || {
        let store = SnapshotStore::new(DataPaths::from_env().raw);
        FdOrg::new(FdOrgConfig::from_env()?, store, PULL_SOURCE).run_probe()?;
        Ok(Outcome::Complete)
    })
}
