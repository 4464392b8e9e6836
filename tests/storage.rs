use std::fs;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

use soccer_ingest::columnar::{read_parquet, read_parquet_or_empty, write_parquet};
use soccer_ingest::config::DataPaths;
use soccer_ingest::join::{self, MASTER_CSV, MASTER_PARQUET, REPORT_FILE};
use soccer_ingest::normalize::{api_football, fdorg};
use soccer_ingest::probe::count_json_items;
use soccer_ingest::snapshot::{SnapshotStore, latest_dated_dir, load_json};
use soccer_ingest::table::{Cell, Table};
use soccer_ingest::team_names::TeamDictionary;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn copy_fixture(name: &str, dest: &Path) {
    fs::create_dir_all(dest.parent().expect("parent dir")).expect("create dirs");
    fs::copy(fixture_path(name), dest).expect("copy fixture");
}

#[test]
fn snapshots_land_in_dated_dirs() {
    let tmp = TempDir::new().expect("tempdir");
    let old = SnapshotStore::new(tmp.path()).with_day("2024-08-01");
    let new = SnapshotStore::new(tmp.path()).with_day("2024-08-15");
    old.dump_json("odds_api", "odds_soccer_epl.json", &json!([{"id": "a"}]))
        .expect("dump old");
    let path = new
        .dump_json("odds_api", "odds_soccer_epl.json", &json!([{"id": "b"}, {"id": "c"}]))
        .expect("dump new");

    assert_eq!(
        path,
        tmp.path().join("odds_api/2024-08-15/odds_soccer_epl.json")
    );
    assert_eq!(
        new.latest_dated_dir("odds_api"),
        Some(tmp.path().join("odds_api/2024-08-15"))
    );
    assert_eq!(count_json_items(&tmp.path().join("odds_api"), None), 2);
    assert_eq!(count_json_items(&tmp.path().join("odds_api"), Some("historical")), 0);
    assert_eq!(latest_dated_dir(&tmp.path().join("missing")), None);
}

#[test]
fn wrapped_payloads_unwrap_on_load() {
    let tmp = TempDir::new().expect("tempdir");
    let store = SnapshotStore::new(tmp.path()).with_day("2024-08-15");
    let path = store
        .dump_json("api_football", "leagues.json", &json!({"json": {"response": [1, 2, 3]}}))
        .expect("dump");
    let value = load_json(&path).expect("load");
    assert_eq!(value, json!({"response": [1, 2, 3]}));
}

#[test]
fn parquet_keeps_types_and_nulls() {
    let tmp = TempDir::new().expect("tempdir");
    let kickoff = Utc.with_ymd_and_hms(2024, 8, 16, 19, 0, 0).unwrap();
    let mut table = Table::with_columns(&["fixture_id", "kickoff_utc", "odds_home", "venue", "live"]);
    table.push_row(vec![
        Cell::Int(1208021),
        Cell::Time(kickoff),
        Cell::Float(1.53),
        Cell::str("Old Trafford"),
        Cell::Bool(false),
    ]);
    table.push_row(vec![Cell::Int(1208022), Cell::Null, Cell::Int(2), Cell::Null, Cell::Null]);

    let path = tmp.path().join("normalized/fixtures.parquet");
    write_parquet(&table, &path).expect("write parquet");
    let back = read_parquet(&path).expect("read parquet");

    assert_eq!(back.columns(), table.columns());
    assert_eq!(back.get(0, "kickoff_utc"), Some(&Cell::Time(kickoff)));
    assert_eq!(back.get(1, "kickoff_utc"), Some(&Cell::Null));
    // Mixed int/float widens to double.
    assert_eq!(back.get(1, "odds_home"), Some(&Cell::Float(2.0)));
    assert_eq!(back.get(0, "venue"), Some(&Cell::str("Old Trafford")));
    assert_eq!(back.get(0, "live"), Some(&Cell::Bool(false)));
}

#[test]
fn parquet_needs_columns() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("empty.parquet");
    assert!(write_parquet(&Table::default(), &path).is_err());
    assert!(read_parquet_or_empty(&path).expect("missing file").is_empty());
}

#[test]
fn csv_round_trip_infers_numbers() {
    let tmp = TempDir::new().expect("tempdir");
    let mut table = Table::with_columns(&["team", "goals", "xg"]);
    table.push_row(vec![Cell::str("Arsenal, London"), Cell::Int(3), Cell::Float(2.25)]);
    table.push_row(vec![Cell::str("Chelsea"), Cell::Null, Cell::Float(1.0)]);
    let path = tmp.path().join("out/table.csv");
    table.write_csv(&path).expect("write csv");
    let back = Table::read_csv(&path).expect("read csv");
    assert_eq!(back.get(0, "team"), Some(&Cell::str("Arsenal, London")));
    assert_eq!(back.get(0, "goals"), Some(&Cell::Int(3)));
    assert_eq!(back.get(1, "goals"), Some(&Cell::Null));
    assert_eq!(back.get(1, "xg"), Some(&Cell::Float(1.0)));
}

#[test]
fn team_dictionary_from_csv() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("team_dictionary.csv");
    fs::write(
        &path,
        "source,source_team,canonical_team\n\
         api_football,Man Utd,Manchester United\n\
         footballdata_org,Manchester United FC,Manchester United\n\
         api_football,,Ignored\n",
    )
    .expect("write dictionary");
    let dict = TeamDictionary::load(&path).expect("load");
    assert_eq!(dict.lookup("api_football", "Man Utd"), Some("Manchester United"));
    assert_eq!(
        dict.lookup("footballdata_org", "Manchester United FC"),
        Some("Manchester United")
    );
    assert_eq!(dict.lookup("api_football", "Ignored"), None);

    let missing = TeamDictionary::load(&tmp.path().join("nope.csv")).expect("missing dictionary");
    assert!(missing.is_empty());
}

fn seeded_paths(tmp: &TempDir) -> DataPaths {
    let paths = DataPaths::new(tmp.path()).with_team_dictionary(tmp.path().join("team_dictionary.csv"));
    fs::write(
        &paths.team_dictionary,
        "source,source_team,canonical_team\n\
         api_football,Man Utd,Manchester United\n\
         footballdata_org,Manchester United FC,Manchester United\n\
         footballdata_org,Fulham FC,Fulham\n",
    )
    .expect("write dictionary");

    let af = paths.raw.join("api_football/2024-08-15");
    copy_fixture("api_football_fixtures.json", &af.join("fixtures_future_next14d.json"));
    copy_fixture("api_football_injuries.json", &af.join("injuries_last14d.json"));
    let fd = paths.raw.join("footballdata_org/2024-08-15");
    copy_fixture("fdorg_matches.json", &fd.join("matches_past_PL.json"));
    paths
}

#[test]
fn normalizers_write_parquet_tables() {
    let tmp = TempDir::new().expect("tempdir");
    let paths = seeded_paths(&tmp);

    api_football::run(&paths).expect("normalize api_football");
    fdorg::run(&paths).expect("normalize fdorg");

    let fx = read_parquet(&paths.normalized.join(api_football::FIXTURES_FILE)).expect("fixtures");
    assert_eq!(fx.len(), 2);
    assert_eq!(
        fx.get(0, "home_team_canonical"),
        Some(&Cell::str("Manchester United"))
    );
    assert!(fx.get(0, "kickoff_utc").is_some_and(|c| c.as_time().is_some()));

    let inj = read_parquet(&paths.normalized.join(api_football::INJURIES_FILE)).expect("injuries");
    assert_eq!(inj.len(), 3);
    assert!(inj.has_column("team_canonical"));

    let matches = read_parquet(&paths.normalized.join(fdorg::MATCHES_FILE)).expect("matches");
    assert_eq!(matches.len(), 2);
    assert_eq!(matches.get(0, "provider"), Some(&Cell::str("footballdata_org")));
}

#[test]
fn api_football_normalize_needs_snapshots() {
    let tmp = TempDir::new().expect("tempdir");
    let paths = DataPaths::new(tmp.path());
    assert!(api_football::run(&paths).is_err());
}

#[test]
fn fdorg_normalize_without_snapshots_writes_empty_schema() {
    let tmp = TempDir::new().expect("tempdir");
    let paths = DataPaths::new(tmp.path()).with_team_dictionary(tmp.path().join("none.csv"));
    fdorg::run(&paths).expect("normalize fdorg");
    let matches = read_parquet(&paths.normalized.join(fdorg::MATCHES_FILE)).expect("matches");
    assert!(matches.is_empty());
    assert!(matches.has_column("ft_home_goals"));
}

#[test]
fn csv_write_reports_unusable_directory() {
    let tmp = TempDir::new().expect("tempdir");
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, "not a directory").expect("write blocker");
    let table = Table::with_columns(&["team"]);
    let err = table
        .write_csv(&blocker.join("sub/table.csv"))
        .expect_err("parent is a file");
    assert!(format!("{err:#}").contains("create directory"), "{err:#}");
}

#[test]
fn join_without_odds_writes_empty_parquet() {
    let tmp = TempDir::new().expect("tempdir");
    let paths = seeded_paths(&tmp);
    api_football::run(&paths).expect("normalize api_football");
    fdorg::run(&paths).expect("normalize fdorg");

    join::run(&paths).expect("stage 7 join");

    assert!(!paths.joined.join(MASTER_CSV).exists());
    let master = read_parquet(&paths.joined.join(MASTER_PARQUET)).expect("master parquet");
    assert!(master.is_empty());
    assert!(master.has_column("fixture_id"));
    assert!(master.has_column("home_key"));

    let report = fs::read_to_string(paths.joined.join(REPORT_FILE)).expect("report");
    let lines = report.lines().collect::<Vec<_>>();
    assert_eq!(lines[0], "Fixtures total: 2");
    assert_eq!(lines[1], "Fixtures joined with odds (±4.0h): 0");
    assert!(!lines.iter().any(|l| l.starts_with("NOTE:")));
}
