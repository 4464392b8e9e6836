use std::path::Path;

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::columnar::write_parquet;
use crate::config::DataPaths;
use crate::normalize::{cell_at, first_match, latest_source_dir, load_payload};
use crate::sources::api_football::SOURCE;
use crate::sources::list_at;
use crate::table::{Cell, Table};
use crate::team_names::TeamDictionary;

pub const FIXTURES_FILE: &str = "api_football_fixtures.parquet";
pub const INJURIES_FILE: &str = "api_football_injuries.parquet";

pub const FIXTURE_COLUMNS: [&str; 10] = [
    "provider",
    "fixture_id",
    "kickoff_utc",
    "league_id",
    "league_name",
    "season",
    "home_team",
    "away_team",
    "status",
    "venue",
];

pub const INJURY_COLUMNS: [&str; 7] = [
    "provider",
    "player_name",
    "player_id",
    "team_name",
    "team_id",
    "type",
    "reason",
];

pub fn flatten_fixtures(payload: &Value) -> Table {
    let mut table = Table::with_columns(&FIXTURE_COLUMNS);
    for r in list_at(payload, "response") {
        table.push_row(vec![
            Cell::str(SOURCE),
            cell_at(r, &["fixture", "id"]),
            cell_at(r, &["fixture", "date"]),
            cell_at(r, &["league", "id"]),
            cell_at(r, &["league", "name"]),
            cell_at(r, &["league", "season"]),
            cell_at(r, &["teams", "home", "name"]),
            cell_at(r, &["teams", "away", "name"]),
            cell_at(r, &["fixture", "status", "short"]),
            cell_at(r, &["fixture", "venue", "name"]),
        ]);
    }
    table
}

pub fn flatten_injuries(payload: &Value) -> Table {
    let mut table = Table::with_columns(&INJURY_COLUMNS);
    for r in list_at(payload, "response") {
        table.push_row(vec![
            Cell::str(SOURCE),
            cell_at(r, &["player", "name"]),
            cell_at(r, &["player", "id"]),
            cell_at(r, &["team", "name"]),
            cell_at(r, &["team", "id"]),
            cell_at(r, &["type"]),
            cell_at(r, &["reason"]),
        ]);
    }
    table
}

/// Fixtures with canonical team columns and a UTC kickoff.
pub fn normalize_fixtures(payload: &Value, dict: &TeamDictionary) -> Table {
    let mut fx = flatten_fixtures(payload);
    dict.canonicalize(&mut fx, SOURCE, "home_team");
    dict.canonicalize(&mut fx, SOURCE, "away_team");
    fx.map_column("kickoff_utc", Cell::to_time);
    fx
}

pub fn normalize_injuries(payload: &Value, dict: &TeamDictionary) -> Table {
    let mut inj = flatten_injuries(payload);
    dict.canonicalize_into(&mut inj, SOURCE, "team_name", "team_canonical");
    inj
}

/// The 14-day injuries pull when present, otherwise any injuries snapshot.
pub fn injuries_snapshot(dir: &Path) -> Option<std::path::PathBuf> {
    first_match(dir, "injuries_", "_last14d.json").or_else(|| first_match(dir, "injuries_", ".json"))
}

pub fn run(paths: &DataPaths) -> Result<()> {
    let dir = latest_source_dir(&paths.raw, SOURCE)
        .ok_or_else(|| anyhow!("no {SOURCE} snapshots under {}", paths.raw.display()))?;
    let dict = TeamDictionary::load(&paths.team_dictionary)?;

    match first_match(&dir, "fixtures_future_", ".json") {
        Some(path) => {
            let fx = normalize_fixtures(&load_payload(&path)?, &dict);
            let out = paths.normalized.join(FIXTURES_FILE);
            write_parquet(&fx, &out)?;
            log::info!("{} fixtures -> {}", fx.len(), out.display());
        }
        None => log::warn!("no fixtures_future snapshot in {}", dir.display()),
    }

    match injuries_snapshot(&dir) {
        Some(path) => {
            let inj = normalize_injuries(&load_payload(&path)?, &dict);
            let out = paths.normalized.join(INJURIES_FILE);
            write_parquet(&inj, &out)?;
            log::info!("{} injuries -> {}", inj.len(), out.display());
        }
        None => log::warn!("no injuries snapshot in {}", dir.display()),
    }
    Ok(())
}
