use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

use crate::cli::Outcome;
use crate::normalize::{cell_at, latest_source_dir};
use crate::snapshot::{SnapshotStore, load_json, matching_files};
use crate::sources::{list_at, str_at};
use crate::table::{Cell, Table};

pub const CANONICAL_SOURCE: &str = "canonical";
pub const CANONICAL_FILE: &str = "odds_api_canonical.csv";

pub const CANONICAL_COLUMNS: [&str; 25] = [
    "provider",
    "provider_event_id",
    "competition",
    "season",
    "match_date_utc",
    "home_team",
    "away_team",
    "status",
    "score_home",
    "score_away",
    "odds_home",
    "odds_draw",
    "odds_away",
    "total_goals_line",
    "total_goals_over_price",
    "total_goals_under_price",
    "spread_home_line",
    "spread_home_price",
    "spread_away_line",
    "spread_away_price",
    "xg_home",
    "xg_away",
    "lineup_home_available",
    "lineup_away_available",
    "source_last_update",
];

const DRAW_LABELS: [&str; 3] = ["Draw", "draw", "X"];

/// Every event list found in the latest `odds_api` snapshot's `odds_*.json` files.
pub fn load_latest_events(raw: &Path) -> Vec<Value> {
    let Some(dir) = latest_source_dir(raw, crate::sources::odds_api::SOURCE) else {
        return Vec::new();
    };
    let mut events = Vec::new();
    for path in matching_files(&dir, "odds_", ".json") {
        match load_json(&path) {
            Ok(Value::Array(list)) => events.extend(list),
            Ok(_) => log::debug!("{} is not an event list", path.display()),
            Err(err) => log::warn!("skipping {}: {err:#}", path.display()),
        }
    }
    events
}

#[derive(Debug, Deserialize)]
struct Bookmaker {
    last_update: Option<String>,
    #[serde(default)]
    markets: Vec<Market>,
}

#[derive(Debug, Deserialize)]
struct Market {
    key: String,
    #[serde(default)]
    outcomes: Vec<MarketOutcome>,
}

#[derive(Debug, Deserialize)]
struct MarketOutcome {
    #[serde(default)]
    name: String,
    price: Option<f64>,
    point: Option<f64>,
}

impl Bookmaker {
    fn market(&self, key: &str) -> Option<&Market> {
        self.markets.iter().find(|m| m.key == key)
    }
}

fn is_team(name: &str, team: Option<&str>) -> bool {
    !name.is_empty() && Some(name) == team
}

fn num(value: Option<f64>) -> Cell {
    value.map(Cell::Float).unwrap_or_default()
}

#[derive(Debug, Default)]
struct Prices {
    odds_home: Cell,
    odds_draw: Cell,
    odds_away: Cell,
    total_line: Cell,
    over: Cell,
    under: Cell,
    spread_home_line: Cell,
    spread_home_price: Cell,
    spread_away_line: Cell,
    spread_away_price: Cell,
}

/// Prices from the bookmaker's h2h, totals and spreads markets.
fn prices(home: Option<&str>, away: Option<&str>, bookmaker: &Bookmaker) -> Prices {
    let mut out = Prices::default();
    if let Some(h2h) = bookmaker.market("h2h") {
        for o in &h2h.outcomes {
            if is_team(&o.name, home) {
                out.odds_home = num(o.price);
            } else if is_team(&o.name, away) {
                out.odds_away = num(o.price);
            } else if DRAW_LABELS.contains(&o.name.as_str()) {
                out.odds_draw = num(o.price);
            }
        }
    }

    if let Some(totals) = bookmaker.market("totals") {
        if let Some(first) = totals.outcomes.first() {
            out.total_line = num(first.point);
        }
        for o in &totals.outcomes {
            let name = o.name.to_lowercase();
            if name.starts_with("over") {
                out.over = num(o.price);
            }
            if name.starts_with("under") {
                out.under = num(o.price);
            }
        }
    }

    if let Some(spreads) = bookmaker.market("spreads") {
        for o in &spreads.outcomes {
            if is_team(&o.name, home) {
                out.spread_home_line = num(o.point);
                out.spread_home_price = num(o.price);
            }
            if is_team(&o.name, away) {
                out.spread_away_line = num(o.point);
                out.spread_away_price = num(o.price);
            }
        }
    }
    out
}

/// First bookmaker of an event; a malformed entry reads as no prices.
fn first_bookmaker(event: &Value) -> Option<Bookmaker> {
    let raw = list_at(event, "bookmakers").first()?;
    match Bookmaker::deserialize(raw) {
        Ok(bookmaker) => Some(bookmaker),
        Err(err) => {
            log::debug!("unreadable bookmaker in event {:?}: {err}", str_at(event, &["id"]));
            None
        }
    }
}

pub fn canonical_row(event: &Value) -> Vec<Cell> {
    let bookmaker = first_bookmaker(event);
    let home = str_at(event, &["home_team"]);
    let away = str_at(event, &["away_team"]);
    let p = bookmaker
        .as_ref()
        .map(|b| prices(home.as_deref(), away.as_deref(), b))
        .unwrap_or_default();
    vec![
        Cell::str("odds_api"),
        cell_at(event, &["id"]),
        cell_at(event, &["sport_title"]),
        Cell::Null,
        cell_at(event, &["commence_time"]),
        cell_at(event, &["home_team"]),
        cell_at(event, &["away_team"]),
        cell_at(event, &["status"]),
        Cell::Null,
        Cell::Null,
        p.odds_home,
        p.odds_draw,
        p.odds_away,
        p.total_line,
        p.over,
        p.under,
        p.spread_home_line,
        p.spread_home_price,
        p.spread_away_line,
        p.spread_away_price,
        Cell::Null,
        Cell::Null,
        Cell::Null,
        Cell::Null,
        Cell::opt_str(bookmaker.as_ref().and_then(|b| b.last_update.as_deref())),
    ]
}

pub fn to_canonical(events: &[Value]) -> Table {
    let mut table = Table::with_columns(&CANONICAL_COLUMNS);
    for event in events {
        table.push_row(canonical_row(event));
    }
    table
}

pub fn canonical_path(store: &SnapshotStore) -> Result<PathBuf> {
    Ok(store.today_dir(CANONICAL_SOURCE)?.join(CANONICAL_FILE))
}

pub fn run(raw: &Path, store: &SnapshotStore) -> Result<Outcome> {
    let events = load_latest_events(raw);
    if events.is_empty() {
        return Ok(Outcome::Skipped(
            "no Odds API soccer events found today — run odds_api_pull first".to_string(),
        ));
    }
    let table = to_canonical(&events);
    println!("\ncanonical sample rows (first 8):");
    println!("{}", table.render(8));
    let path = canonical_path(store)?;
    table.write_csv(&path)?;
    println!("\nsaved canonical csv → {}", path.display());
    Ok(Outcome::Complete)
}
