use std::process::ExitCode;

use soccer_ingest::cli::{self, Outcome};
use soccer_ingest::config::DataPaths;
use soccer_ingest::snapshot::SnapshotStore;
use soccer_ingest::sources::football_data_org::{CONNECT_SOURCE, FdOrg, FdOrgConfig};

fn main() -> ExitCode {
    cli::run("football_data_org_connect", || {
        let store = SnapshotStore::new(DataPaths::from_env().raw);
        FdOrg::new(FdOrgConfig::from_env()?, store, CONNECT_SOURCE).run_connect()?;
        Ok(Outcome::Complete)
    })
}
