use anyhow::{Context, Result};
use serde_json::Value;

use crate::cli::Outcome;
use crate::config::env_or;
use crate::http_client::{Request, get_json};
use crate::report::{print_fields, short_obs};
use crate::snapshot::SnapshotStore;
use crate::sources::pick;
use crate::table::{Cell, Table};

pub const SOURCE: &str = "openligadb";

const DEFAULT_URL: &str = "https://api.openligadb.de/getmatchdata/bl1/2024";
const SAMPLE_ROWS: usize = 5;
const SCORELINE_WINDOW: usize = 50;

/// Final entry of `matchResults`, whichever casing the feed uses.
pub fn last_result(m: &Value) -> Option<&Value> {
    pick(m, &["matchResults", "MatchResults"])
        .and_then(|v| v.as_array())
        .and_then(|list| list.last())
}

fn points(result: Option<&Value>, keys: &[&str]) -> String {
    result
        .and_then(|r| pick(r, keys))
        .filter(|v| !v.is_null())
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "0".to_string())
}

pub fn scoreline(m: &Value) -> String {
    let result = last_result(m);
    format!(
        "{}-{}",
        points(result, &["pointsTeam1", "PointsTeam1"]),
        points(result, &["pointsTeam2", "PointsTeam2"])
    )
}

fn team_name(m: &Value, keys: &[&str]) -> Cell {
    let team = pick(m, keys);
    Cell::from_json_opt(team.and_then(|t| pick(t, &["teamName", "TeamName"])))
}

pub fn sample_table(matches: &[Value]) -> Table {
    let mut table = Table::with_columns(&["MatchID", "DateUTC", "Team1", "Team2", "Score"]);
    for m in matches.iter().take(SAMPLE_ROWS) {
        table.push_row(vec![
            Cell::from_json_opt(pick(m, &["matchID", "MatchID"])),
            Cell::from_json_opt(pick(m, &["matchDateTimeUTC", "MatchDateTimeUTC"])),
            team_name(m, &["team1", "Team1"]),
            team_name(m, &["team2", "Team2"]),
            Cell::str(scoreline(m)),
        ]);
    }
    table
}

/// Most common scorelines; ties keep first-seen order.
pub fn top_scorelines(matches: &[Value], top: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for m in matches.iter().take(SCORELINE_WINDOW) {
        let score = scoreline(m);
        match counts.iter_mut().find(|(s, _)| *s == score) {
            Some((_, n)) => *n += 1,
            None => counts.push((score, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(top);
    counts
}

pub fn run(store: &SnapshotStore) -> Result<Outcome> {
    let url = env_or("OPENLIGADB_URL", DEFAULT_URL);
    let data = get_json(&url, &Request::new()).context("openligadb match data")?;
    store.dump_json(SOURCE, "bl1_2024.json", &data)?;

    let matches = data.as_array().map(|v| v.as_slice()).unwrap_or(&[]);
    let Some(first) = matches.first() else {
        return Ok(Outcome::Skipped("no matches returned".to_string()));
    };
    print_fields(
        "openligadb match item fields",
        &Value::from(vec![first.clone()]),
    );

    println!("\nsample normalized values:");
    println!("{}", sample_table(matches).render(SAMPLE_ROWS));

    let lines = top_scorelines(matches, 5)
        .into_iter()
        .map(|(score, n)| format!("{score}: {n}"))
        .collect::<Vec<_>>();
    short_obs("scoreline counts (first 50)", &lines);
    Ok(Outcome::Complete)
}
