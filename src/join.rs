//! Stage 7: fixtures joined with odds, results and injury counts into one
//! training table, plus a short QC report.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::columnar::{read_parquet_or_empty, write_parquet};
use crate::config::{DataPaths, env_opt};
use crate::normalize::{api_football, fdorg, odds_canonical};
use crate::snapshot::{latest_dated_dir, write_atomic};
use crate::table::{Cell, Table};
use crate::team_names::norm_name;

pub const MASTER_PARQUET: &str = "stage7_master_training_table.parquet";
pub const MASTER_CSV: &str = "stage7_master_training_table.csv";
pub const REPORT_FILE: &str = "stage7_join_report.txt";

pub const DEFAULT_HOURS: f64 = 4.0;
pub const JOIN_KEYS: [&str; 2] = ["home_key", "away_key"];

/// Suffix for right-side columns whose name is already taken on the left.
pub const RIGHT_SUFFIX: &str = "_b";

/// Names the FD.org result time and status take in the master table.
pub const RESULT_KICKOFF: &str = "result_kickoff_utc";
pub const RESULT_STATUS: &str = "result_status";

const MS_PER_HOUR: f64 = 3_600_000.0;

pub fn join_hours() -> f64 {
    window_hours(env_opt("STAGE7_JOIN_HOURS").as_deref())
}

/// Parsed join window; unparseable, non-finite or negative values fall back to
/// [`DEFAULT_HOURS`].
pub fn window_hours(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return DEFAULT_HOURS;
    };
    match raw.trim().parse::<f64>() {
        Ok(hours) if hours.is_finite() && hours >= 0.0 => hours,
        _ => {
            log::warn!("ignoring STAGE7_JOIN_HOURS={raw:?}; using {DEFAULT_HOURS:?}");
            DEFAULT_HOURS
        }
    }
}

/// Exact-key join restricted to a time window, keeping the closest match per left row.
///
/// Pairs survive when the right time lies within `hours` of the left time, or when
/// either time is missing. Survivors are ordered by absolute time difference
/// (missing differences last) and deduplicated on `left_id_col` when the output has
/// it, otherwise on the keys plus the left time. Right-side non-key columns that
/// collide get [`RIGHT_SUFFIX`] until the name is free; `b_time` follows that rename.
///
/// No surviving pair gives an empty table that still carries the joined columns.
pub fn join_time(
    a: &Table,
    a_time: &str,
    b: &Table,
    b_time: &str,
    keys: &[&str],
    hours: f64,
    left_id_col: Option<&str>,
) -> Table {
    if a.is_empty() || b.is_empty() {
        return Table::default();
    }
    let (Some(a_time_idx), Some(b_time_idx)) = (a.col_index(a_time), b.col_index(b_time)) else {
        log::warn!("join skipped: missing time column {a_time} or {b_time}");
        return Table::default();
    };
    let (Some(a_keys), Some(b_keys)) = (key_indices(a, keys), key_indices(b, keys)) else {
        log::warn!("join skipped: key columns {keys:?} missing on one side");
        return Table::default();
    };

    let b_extra = (0..b.width())
        .filter(|i| !b_keys.contains(i))
        .collect::<Vec<_>>();
    let mut columns = a.columns().to_vec();
    for &i in &b_extra {
        let name = joined_name(&columns, &b.columns()[i]);
        columns.push(name);
    }

    let mut index: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
    for (j, row) in b.rows().iter().enumerate() {
        index.entry(key_of(row, &b_keys)).or_default().push(j);
    }

    let window_ms = hours * MS_PER_HOUR;
    let mut pairs: Vec<(Option<i64>, Vec<Cell>)> = Vec::new();
    for row in a.rows() {
        let Some(matches) = index.get(&key_of(row, &a_keys)) else {
            continue;
        };
        let left_t = row[a_time_idx].as_time();
        for &j in matches {
            let right = &b.rows()[j];
            let right_t = right[b_time_idx].as_time();
            let dt = match (left_t, right_t) {
                (Some(l), Some(r)) => {
                    let diff = (r - l).num_milliseconds().abs();
                    let within = (diff as f64) <= window_ms;
                    if !within {
                        continue;
                    }
                    Some(diff)
                }
                _ => None,
            };
            let mut cells = row.clone();
            cells.extend(b_extra.iter().map(|&i| right[i].clone()));
            pairs.push((dt, cells));
        }
    }
    if pairs.is_empty() {
        return Table::new(columns);
    }
    pairs.sort_by_key(|(dt, _)| (dt.is_none(), dt.unwrap_or(0)));

    let dedup_cols = match left_id_col.and_then(|c| a.col_index(c)) {
        Some(idx) => vec![idx],
        None => {
            let mut cols = a_keys.clone();
            cols.push(a_time_idx);
            cols
        }
    };
    let mut seen = HashSet::new();
    let mut out = Table::new(columns);
    for (_, cells) in pairs {
        if seen.insert(key_of(&cells, &dedup_cols)) {
            out.push_row(cells);
        }
    }
    out
}

fn key_indices(table: &Table, keys: &[&str]) -> Option<Vec<usize>> {
    keys.iter().map(|k| table.col_index(k)).collect()
}

fn key_of(row: &[Cell], idx: &[usize]) -> Vec<String> {
    idx.iter().map(|&i| row[i].text()).collect()
}

/// Name a right-side column takes next to the `taken` output columns.
pub fn joined_name(taken: &[String], b_col: &str) -> String {
    let mut name = b_col.to_string();
    while taken.contains(&name) {
        name.push_str(RIGHT_SUFFIX);
    }
    name
}

fn add_keys(table: &mut Table, home: &str, away: &str) {
    let home_key = table.column(home).iter().map(|c| Cell::str(norm_name(c))).collect();
    let away_key = table.column(away).iter().map(|c| Cell::str(norm_name(c))).collect();
    table.set_column("home_key", home_key);
    table.set_column("away_key", away_key);
}

/// `home_away_kickoff` ids for tables that carry no fixture id at all.
pub fn synthesize_fixture_ids(fx: &mut Table) {
    if fx.column("fixture_id").iter().any(|c| !c.is_null()) {
        return;
    }
    let home = fx.column("home_canon");
    let away = fx.column("away_canon");
    let kickoff = fx.column("kickoff_utc");
    let ids = home
        .iter()
        .zip(&away)
        .zip(&kickoff)
        .map(|((h, a), k)| {
            let k = if k.is_null() { "NaT".to_string() } else { k.text() };
            Cell::str(format!("{}_{}_{k}", h.text(), a.text()))
        })
        .collect();
    fx.set_column("fixture_id", ids);
}

pub fn prepare_fixtures(mut fx: Table) -> Table {
    fx.ensure_col("home_canon", &["home_team_canonical", "home_team"]);
    fx.ensure_col("away_canon", &["away_team_canonical", "away_team"]);
    fx.ensure_col("kickoff_utc", &["kickoff_utc", "match_date_utc", "date_utc"]);
    fx.map_column("kickoff_utc", Cell::to_time);
    fx.ensure_col("fixture_id", &["fixture_id"]);
    synthesize_fixture_ids(&mut fx);
    add_keys(&mut fx, "home_canon", "away_canon");
    fx
}

pub fn prepare_results(mut fdm: Table) -> Table {
    fdm.ensure_col("home_canon", &["home_team_canonical", "home_team"]);
    fdm.ensure_col("away_canon", &["away_team_canonical", "away_team"]);
    fdm.ensure_col(
        "kickoff_utc",
        &["kickoff_utc", "utcDate", "match_date_utc", "date_utc"],
    );
    fdm.map_column("kickoff_utc", Cell::to_time);
    fdm.ensure_col("ft_home_goals", &["ft_home_goals"]);
    fdm.ensure_col("ft_away_goals", &["ft_away_goals"]);
    fdm.ensure_col("status", &["status"]);
    add_keys(&mut fdm, "home_canon", "away_canon");
    fdm
}

pub fn prepare_odds(mut odds: Table) -> Table {
    if odds.is_empty() {
        return odds;
    }
    odds.ensure_col("match_date_utc", &["match_date_utc", "date_utc"]);
    odds.map_column("match_date_utc", Cell::to_time);
    odds.ensure_col("home_team", &["home_team"]);
    odds.ensure_col("away_team", &["away_team"]);
    add_keys(&mut odds, "home_team", "away_team");
    odds
}

/// Per-team injury counts on both sides; teams without injuries count zero.
pub fn add_injury_counts(table: &mut Table, injuries: &Table) {
    let team_col = if injuries.has_column("team_canonical") {
        "team_canonical"
    } else {
        "team_name"
    };
    let mut counts: HashMap<String, i64> = HashMap::new();
    for cell in injuries.column(team_col) {
        *counts.entry(norm_name(&cell)).or_default() += 1;
    }
    for (key_col, out_col) in [
        ("home_key", "inj_count_team_home"),
        ("away_key", "inj_count_team_away"),
    ] {
        let values = table
            .column(key_col)
            .iter()
            .map(|k| Cell::Int(counts.get(&k.text()).copied().unwrap_or(0)))
            .collect();
        table.set_column(out_col, values);
    }
}

fn percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

pub fn qc_lines(fx: &Table, fx_odds: &Table, master: &Table, hours: f64) -> Vec<String> {
    let mut lines = vec![
        format!("Fixtures total: {}", fx.len()),
        format!(
            "Fixtures joined with odds (±{hours:?}h): {}",
            fx_odds.nunique("fixture_id")
        ),
        format!(
            "Fixtures joined with results (±{hours:?}h): {}",
            master.nunique("fixture_id")
        ),
    ];
    let has_all = |cols: &[&str]| !master.is_empty() && cols.iter().all(|c| master.has_column(c));
    if has_all(&["odds_home", "odds_draw", "odds_away"]) {
        lines.push(format!(
            "Null odds_home %: {}",
            percent(master.null_fraction_any(&["odds_home"]))
        ));
    } else {
        lines.push("odds columns absent after join".to_string());
    }
    if has_all(&["ft_home_goals", "ft_away_goals"]) {
        lines.push(format!(
            "Null FT goals %: {}",
            percent(master.null_fraction_any(&["ft_home_goals", "ft_away_goals"]))
        ));
    } else {
        lines.push("results columns absent after join".to_string());
    }
    lines
}

/// Latest `raw/canonical/<day>/odds_api_canonical.csv`, else the flat fallback.
pub fn latest_canonical_odds_csv(raw: &Path) -> Option<PathBuf> {
    let base = raw.join(odds_canonical::CANONICAL_SOURCE);
    if let Some(dir) = latest_dated_dir(&base) {
        let cand = dir.join(odds_canonical::CANONICAL_FILE);
        if cand.exists() {
            return Some(cand);
        }
    }
    let fallback = base.join(odds_canonical::CANONICAL_FILE);
    fallback.exists().then_some(fallback)
}

#[derive(Debug, Clone, Default)]
pub struct JoinInputs {
    pub fixtures: Table,
    pub results: Table,
    pub injuries: Table,
    pub odds: Table,
}

impl JoinInputs {
    /// Every input is optional; missing files read as empty tables.
    pub fn load(paths: &DataPaths) -> Result<Self> {
        let odds = match latest_canonical_odds_csv(&paths.raw) {
            Some(path) => {
                log::info!("odds from {}", path.display());
                Table::read_csv(&path)?
            }
            None => Table::default(),
        };
        Ok(Self {
            fixtures: read_parquet_or_empty(&paths.normalized.join(api_football::FIXTURES_FILE))?,
            results: read_parquet_or_empty(&paths.normalized.join(fdorg::MATCHES_FILE))?,
            injuries: read_parquet_or_empty(&paths.normalized.join(api_football::INJURIES_FILE))?,
            odds,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MasterJoin {
    pub table: Table,
    pub qc_lines: Vec<String>,
}

pub fn build_master(inputs: JoinInputs, hours: f64) -> MasterJoin {
    let fx = prepare_fixtures(inputs.fixtures);
    let fdm = prepare_results(inputs.results);
    let odds = prepare_odds(inputs.odds);

    let fx_odds = if !fx.is_empty() && !odds.is_empty() {
        join_time(
            &fx,
            "kickoff_utc",
            &odds,
            "match_date_utc",
            &JOIN_KEYS,
            hours,
            Some("fixture_id"),
        )
    } else {
        Table::default()
    };

    let mut master = if !fx_odds.is_empty() && !fdm.is_empty() {
        let mut results = fdm.select(&[
            "kickoff_utc",
            "home_key",
            "away_key",
            "ft_home_goals",
            "ft_away_goals",
            "status",
        ]);
        results.rename_column("kickoff_utc", RESULT_KICKOFF);
        results.rename_column("status", RESULT_STATUS);
        join_time(
            &fx_odds,
            "kickoff_utc",
            &results,
            RESULT_KICKOFF,
            &JOIN_KEYS,
            hours,
            Some("fixture_id"),
        )
    } else {
        fx_odds.clone()
    };
    if master.width() == 0 {
        // Nothing joined; an empty table with the fixture schema.
        master = Table::new(fx.columns().to_vec());
    }

    if !master.is_empty() {
        add_injury_counts(&mut master, &inputs.injuries);
    }

    let qc_lines = qc_lines(&fx, &fx_odds, &master, hours);
    MasterJoin {
        table: master,
        qc_lines,
    }
}

/// Writes the master table (parquet, CSV on failure) and the QC report.
pub fn write_outputs(joined_dir: &Path, result: &mut MasterJoin) -> Result<()> {
    let parquet_path = joined_dir.join(MASTER_PARQUET);
    if let Err(err) = write_parquet(&result.table, &parquet_path) {
        log::warn!("parquet write failed: {err:#}");
        result.table.write_csv(&joined_dir.join(MASTER_CSV))?;
        result
            .qc_lines
            .push(format!("NOTE: Parquet write failed, wrote CSV instead. ({err:#})"));
    }
    write_atomic(
        &joined_dir.join(REPORT_FILE),
        result.qc_lines.join("\n").as_bytes(),
    )
}

pub fn run(paths: &DataPaths) -> Result<()> {
    let inputs = JoinInputs::load(paths)?;
    let mut result = build_master(inputs, join_hours());
    write_outputs(&paths.joined, &mut result)?;
    println!("Stage 7 master table → {}", paths.joined.display());
    println!("{}", result.qc_lines.join("\n"));
    Ok(())
}
