use anyhow::Result;
use serde_json::Value;

use crate::columnar::write_parquet;
use crate::config::DataPaths;
use crate::normalize::{cell_at, latest_source_dir, load_payload};
use crate::snapshot::matching_files;
use crate::sources::football_data_org::CONNECT_SOURCE;
use crate::sources::list_at;
use crate::table::{Cell, Table};
use crate::team_names::TeamDictionary;

pub const MATCHES_FILE: &str = "fdorg_matches.parquet";

pub const MATCH_COLUMNS: [&str; 9] = [
    "provider",
    "comp_code",
    "match_id",
    "kickoff_utc",
    "status",
    "home_team",
    "away_team",
    "ft_home_goals",
    "ft_away_goals",
];

pub fn flatten_matches(payload: &Value) -> Table {
    let mut table = Table::with_columns(&MATCH_COLUMNS);
    for m in list_at(payload, "matches") {
        table.push_row(vec![
            Cell::str(CONNECT_SOURCE),
            cell_at(m, &["competition", "code"]),
            cell_at(m, &["id"]),
            cell_at(m, &["utcDate"]),
            cell_at(m, &["status"]),
            cell_at(m, &["homeTeam", "name"]),
            cell_at(m, &["awayTeam", "name"]),
            cell_at(m, &["score", "fullTime", "home"]),
            cell_at(m, &["score", "fullTime", "away"]),
        ]);
    }
    table
}

pub fn normalize_matches(payloads: &[Value], dict: &TeamDictionary) -> Table {
    let frames = payloads.iter().map(flatten_matches).collect::<Vec<_>>();
    let mut df = if frames.is_empty() {
        Table::with_columns(&MATCH_COLUMNS)
    } else {
        Table::concat(&frames)
    };
    dict.canonicalize(&mut df, CONNECT_SOURCE, "home_team");
    dict.canonicalize(&mut df, CONNECT_SOURCE, "away_team");
    df.map_column("kickoff_utc", Cell::to_time);
    df
}

/// Future windows first, then past ones.
pub fn load_match_payloads(paths: &DataPaths) -> Result<Vec<Value>> {
    let Some(dir) = latest_source_dir(&paths.raw, CONNECT_SOURCE) else {
        log::warn!("no {CONNECT_SOURCE} snapshots under {}", paths.raw.display());
        return Ok(Vec::new());
    };
    let mut files = matching_files(&dir, "matches_future_", ".json");
    files.extend(matching_files(&dir, "matches_past_", ".json"));
    files.iter().map(|p| load_payload(p)).collect()
}

pub fn run(paths: &DataPaths) -> Result<()> {
    let payloads = load_match_payloads(paths)?;
    let dict = TeamDictionary::load(&paths.team_dictionary)?;
    let df = normalize_matches(&payloads, &dict);
    let out = paths.normalized.join(MATCHES_FILE);
    write_parquet(&df, &out)?;
    log::info!("{} matches -> {}", df.len(), out.display());
    Ok(())
}
