use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use soccer_ingest::join::{
    JoinInputs, RESULT_KICKOFF, RESULT_STATUS, add_injury_counts, build_master, join_time,
    prepare_fixtures,
};
use soccer_ingest::normalize::odds_canonical::to_canonical;
use soccer_ingest::table::{Cell, Table};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 16, h, m, 0).unwrap()
}

fn fixtures() -> Table {
    let mut fx = Table::with_columns(&["fixture_id", "home_key", "away_key", "kickoff_utc", "status"]);
    fx.push_row(vec![
        Cell::Int(1),
        Cell::str("arsenal"),
        Cell::str("chelsea"),
        Cell::Time(at(19, 0)),
        Cell::str("NS"),
    ]);
    fx.push_row(vec![
        Cell::Int(2),
        Cell::str("everton"),
        Cell::str("fulham"),
        Cell::Time(at(15, 0)),
        Cell::str("NS"),
    ]);
    fx
}

fn odds() -> Table {
    let mut odds = Table::with_columns(&["home_key", "away_key", "match_date_utc", "odds_home", "status"]);
    odds.push_row(vec![
        Cell::str("arsenal"),
        Cell::str("chelsea"),
        Cell::Time(at(21, 0)),
        Cell::Float(2.3),
        Cell::Null,
    ]);
    odds.push_row(vec![
        Cell::str("arsenal"),
        Cell::str("chelsea"),
        Cell::Time(at(19, 15)),
        Cell::Float(2.1),
        Cell::Null,
    ]);
    // Outside the window.
    odds.push_row(vec![
        Cell::str("everton"),
        Cell::str("fulham"),
        Cell::Time(at(23, 30)),
        Cell::Float(3.0),
        Cell::Null,
    ]);
    odds
}

#[test]
fn keeps_closest_match_inside_window() {
    let out = join_time(
        &fixtures(),
        "kickoff_utc",
        &odds(),
        "match_date_utc",
        &["home_key", "away_key"],
        4.0,
        Some("fixture_id"),
    );
    assert_eq!(out.len(), 1);
    assert_eq!(out.get(0, "fixture_id"), Some(&Cell::Int(1)));
    assert_eq!(out.get(0, "odds_home"), Some(&Cell::Float(2.1)));
    // Left columns keep their names; the colliding right column is suffixed.
    assert_eq!(out.get(0, "status"), Some(&Cell::str("NS")));
    assert_eq!(out.get(0, "status_b"), Some(&Cell::Null));
    assert_eq!(out.get(0, "match_date_utc"), Some(&Cell::Time(at(19, 15))));
}

#[test]
fn wider_window_admits_more_pairs() {
    let out = join_time(
        &fixtures(),
        "kickoff_utc",
        &odds(),
        "match_date_utc",
        &["home_key", "away_key"],
        9.0,
        Some("fixture_id"),
    );
    assert_eq!(out.len(), 2);
    assert_eq!(out.nunique("fixture_id"), 2);
}

#[test]
fn missing_times_still_join() {
    let mut fx = fixtures();
    fx.map_column("kickoff_utc", |_| Cell::Null);
    let out = join_time(
        &fx,
        "kickoff_utc",
        &odds(),
        "match_date_utc",
        &["home_key", "away_key"],
        4.0,
        Some("fixture_id"),
    );
    // Every pair has an unknown difference; the first one per fixture wins.
    assert_eq!(out.len(), 2);
    assert_eq!(out.get(0, "odds_home"), Some(&Cell::Float(2.3)));
}

#[test]
fn nan_window_keeps_no_timed_pairs() {
    let mut far = odds();
    far.map_column("match_date_utc", |_| {
        Cell::Time(Utc.with_ymd_and_hms(2026, 1, 10, 19, 0, 0).unwrap())
    });
    let out = join_time(
        &fixtures(),
        "kickoff_utc",
        &far,
        "match_date_utc",
        &["home_key", "away_key"],
        f64::NAN,
        Some("fixture_id"),
    );
    assert!(out.is_empty());
    assert!(out.has_column("odds_home"));
}

#[test]
fn repeated_collisions_keep_names_unique() {
    let mut left = fixtures();
    left.set_column("status_b", vec![Cell::str("x"), Cell::str("y")]);
    let out = join_time(
        &left,
        "kickoff_utc",
        &odds(),
        "match_date_utc",
        &["home_key", "away_key"],
        4.0,
        Some("fixture_id"),
    );
    assert_eq!(out.get(0, "status_b"), Some(&Cell::str("x")));
    assert_eq!(out.get(0, "status_b_b"), Some(&Cell::Null));
}

#[test]
fn empty_side_gives_empty_table() {
    let out = join_time(
        &fixtures(),
        "kickoff_utc",
        &Table::with_columns(&["home_key", "away_key", "match_date_utc"]),
        "match_date_utc",
        &["home_key", "away_key"],
        4.0,
        Some("fixture_id"),
    );
    assert!(out.is_empty());
    assert_eq!(out.width(), 0);
}

#[test]
fn dedups_on_keys_and_time_without_id() {
    let mut fx = fixtures();
    fx.drop_columns(&["fixture_id"]);
    let out = join_time(
        &fx,
        "kickoff_utc",
        &odds(),
        "match_date_utc",
        &["home_key", "away_key"],
        4.0,
        None,
    );
    assert_eq!(out.len(), 1);
    assert_eq!(out.get(0, "odds_home"), Some(&Cell::Float(2.1)));
}

#[test]
fn fixture_columns_fall_back_to_raw_names() {
    let mut raw = Table::with_columns(&["home_team", "away_team", "match_date_utc"]);
    raw.push_row(vec![
        Cell::str(" Arsenal "),
        Cell::str("Chelsea"),
        Cell::str("2024-08-16T19:00:00Z"),
    ]);
    let fx = prepare_fixtures(raw);
    assert_eq!(fx.get(0, "home_canon"), Some(&Cell::str(" Arsenal ")));
    assert_eq!(fx.get(0, "home_key"), Some(&Cell::str("arsenal")));
    assert_eq!(fx.get(0, "kickoff_utc"), Some(&Cell::Time(at(19, 0))));
    assert_eq!(
        fx.get(0, "fixture_id"),
        Some(&Cell::str(" Arsenal _Chelsea_2024-08-16 19:00:00+00:00"))
    );
}

#[test]
fn injury_counts_default_to_zero() {
    let mut table = Table::with_columns(&["home_key", "away_key"]);
    table.push_row(vec![Cell::str("arsenal"), Cell::str("chelsea")]);
    let mut inj = Table::with_columns(&["team_name", "team_canonical"]);
    inj.push_row(vec![Cell::str("Arsenal FC"), Cell::str("Arsenal")]);
    inj.push_row(vec![Cell::str("Arsenal FC"), Cell::str("Arsenal")]);
    add_injury_counts(&mut table, &inj);
    assert_eq!(table.get(0, "inj_count_team_home"), Some(&Cell::Int(2)));
    assert_eq!(table.get(0, "inj_count_team_away"), Some(&Cell::Int(0)));
}

fn master_inputs() -> JoinInputs {
    let mut fixtures = Table::with_columns(&[
        "provider",
        "fixture_id",
        "kickoff_utc",
        "home_team",
        "away_team",
        "status",
        "home_team_canonical",
        "away_team_canonical",
    ]);
    fixtures.push_row(vec![
        Cell::str("api_football"),
        Cell::Int(1208021),
        Cell::Time(at(19, 0)),
        Cell::str("Man Utd"),
        Cell::str("Fulham"),
        Cell::str("NS"),
        Cell::str("Manchester United"),
        Cell::str("Fulham"),
    ]);

    let mut results = Table::with_columns(&[
        "match_id",
        "kickoff_utc",
        "status",
        "ft_home_goals",
        "ft_away_goals",
        "home_team_canonical",
        "away_team_canonical",
    ]);
    results.push_row(vec![
        Cell::Int(497410),
        Cell::Time(at(19, 0)),
        Cell::str("FINISHED"),
        Cell::Int(1),
        Cell::Int(0),
        Cell::str("Manchester United"),
        Cell::str("Fulham"),
    ]);

    let odds = Table::from_csv_str(
        "provider,provider_event_id,match_date_utc,home_team,away_team,odds_home,odds_draw,odds_away\n\
         odds_api,e91,2024-08-16T19:00:00Z,Manchester United,Fulham,1.53,4.4,6.5\n",
    )
    .expect("odds csv");

    let mut injuries = Table::with_columns(&["team_name", "team_canonical"]);
    injuries.push_row(vec![Cell::str("Man Utd"), Cell::str("Manchester United")]);

    JoinInputs {
        fixtures,
        results,
        injuries,
        odds,
    }
}

#[test]
fn builds_master_row_with_results_and_injuries() {
    let result = build_master(master_inputs(), 4.0);
    let table = &result.table;
    assert_eq!(table.len(), 1);
    assert_eq!(table.get(0, "odds_home"), Some(&Cell::Float(1.53)));
    assert_eq!(table.get(0, "provider_b"), Some(&Cell::str("odds_api")));
    assert_eq!(table.get(0, "ft_home_goals"), Some(&Cell::Int(1)));
    assert_eq!(table.get(0, RESULT_KICKOFF), Some(&Cell::Time(at(19, 0))));
    assert_eq!(table.get(0, RESULT_STATUS), Some(&Cell::str("FINISHED")));
    assert_eq!(table.get(0, "inj_count_team_home"), Some(&Cell::Int(1)));
    assert_eq!(table.get(0, "inj_count_team_away"), Some(&Cell::Int(0)));
    assert_eq!(
        result.qc_lines,
        vec![
            "Fixtures total: 1",
            "Fixtures joined with odds (±4.0h): 1",
            "Fixtures joined with results (±4.0h): 1",
            "Null odds_home %: 0.00%",
            "Null FT goals %: 0.00%",
        ]
    );
}

#[test]
fn master_with_canonical_odds_has_unique_columns() {
    let events: Value = serde_json::from_str(&read_fixture("odds_events.json")).expect("valid json");
    let mut inputs = master_inputs();
    inputs.odds = to_canonical(events.as_array().expect("event list"));
    let result = build_master(inputs, 4.0);
    let table = &result.table;
    assert_eq!(table.len(), 1);

    let names = table.columns().iter().collect::<HashSet<_>>();
    assert_eq!(names.len(), table.width(), "duplicate columns in {:?}", table.columns());

    assert_eq!(table.get(0, "status"), Some(&Cell::str("NS")));
    assert_eq!(table.get(0, "status_b"), Some(&Cell::Null));
    assert_eq!(table.get(0, RESULT_STATUS), Some(&Cell::str("FINISHED")));
    assert_eq!(table.get(0, "odds_home"), Some(&Cell::Float(1.53)));
    assert_eq!(table.get(0, "provider_event_id"), Some(&Cell::str("e912304de2b2ce35b473ce2ecd3d1502")));
}

#[test]
fn master_without_odds_reports_absent_columns() {
    let mut inputs = master_inputs();
    inputs.odds = Table::default();
    let result = build_master(inputs, 4.0);
    assert!(result.table.is_empty());
    assert!(result.table.has_column("fixture_id"));
    assert_eq!(
        result.qc_lines,
        vec![
            "Fixtures total: 1",
            "Fixtures joined with odds (±4.0h): 0",
            "Fixtures joined with results (±4.0h): 0",
            "odds columns absent after join",
            "results columns absent after join",
        ]
    );
}

#[test]
fn master_with_empty_inputs() {
    let result = build_master(JoinInputs::default(), 2.5);
    assert!(result.table.is_empty());
    assert_eq!(result.qc_lines[0], "Fixtures total: 0");
    assert_eq!(result.qc_lines[1], "Fixtures joined with odds (±2.5h): 0");
}
