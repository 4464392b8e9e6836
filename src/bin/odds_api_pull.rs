use std::process::ExitCode;

use soccer_ingest::cli::{self, Outcome};
use soccer_ingest::config::DataPaths;
use soccer_ingest::snapshot::SnapshotStore;
use soccer_ingest::sources::odds_api::{OddsApi, OddsApiConfig};

fn main() -> ExitCode {
    cli::run("odds_api_pull", || {
        let store = SnapshotStore::new(DataPaths::from_env().raw);
        OddsApi::new(OddsApiConfig::from_env()?, store).run()?;
        Ok(Outcome::Complete)
    })
}
