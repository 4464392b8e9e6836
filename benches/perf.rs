use chrono::{Duration, TimeZone, Utc};
use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::Value;
use std::hint::black_box;

use soccer_ingest::join::{JoinInputs, JOIN_KEYS, build_master, join_time, prepare_fixtures, prepare_odds};
use soccer_ingest::normalize::odds_canonical::to_canonical;
use soccer_ingest::table::{Cell, Table};

const TEAMS: [&str; 20] = [
    "Arsenal",
    "Aston Villa",
    "Bournemouth",
    "Brentford",
    "Brighton",
    "Chelsea",
    "Crystal Palace",
    "Everton",
    "Fulham",
    "Ipswich",
    "Leicester",
    "Liverpool",
    "Manchester City",
    "Manchester United",
    "Newcastle",
    "Nottingham Forest",
    "Southampton",
    "Tottenham",
    "West Ham",
    "Wolves",
];

const EVENT_JSON: &str = r#"{
  "id": "e912304de2b2ce35b473ce2ecd3d1502",
  "sport_key": "soccer_epl",
  "sport_title": "EPL",
  "commence_time": "2024-08-16T19:00:00Z",
  "home_team": "Manchester United",
  "away_team": "Fulham",
  "bookmakers": [{
    "key": "pinnacle",
    "title": "Pinnacle",
    "last_update": "2024-08-15T10:12:00Z",
    "markets": [
      {"key": "h2h", "outcomes": [
        {"name": "Manchester United", "price": 1.53},
        {"name": "Fulham", "price": 6.5},
        {"name": "Draw", "price": 4.4}
      ]},
      {"key": "totals", "outcomes": [
        {"name": "Over", "price": 1.8, "point": 2.5},
        {"name": "Under", "price": 2.02, "point": 2.5}
      ]}
    ]
  }]
}"#;

/// Double round robin, one fixture per pair, kickoffs spread over a season.
fn season_fixtures() -> Table {
    let start = Utc.with_ymd_and_hms(2024, 8, 16, 19, 0, 0).unwrap();
    let mut fx = Table::with_columns(&["fixture_id", "kickoff_utc", "home_team", "away_team"]);
    let mut id = 0i64;
    for home in TEAMS {
        for away in TEAMS {
            if home == away {
                continue;
            }
            id += 1;
            fx.push_row(vec![
                Cell::Int(id),
                Cell::Time(start + Duration::hours(id * 7)),
                Cell::str(home),
                Cell::str(away),
            ]);
        }
    }
    fx
}

fn season_odds(fx: &Table) -> Table {
    let mut odds = Table::with_columns(&["match_date_utc", "home_team", "away_team", "odds_home"]);
    for row in fx.rows() {
        let Some(kickoff) = row[1].as_time() else {
            continue;
        };
        // Two quotes per fixture: one on time, one shifted outside a 4h window.
        for shift in [0, 6] {
            odds.push_row(vec![
                Cell::Time(kickoff + Duration::hours(shift)),
                row[2].clone(),
                row[3].clone(),
                Cell::Float(2.0 + shift as f64 / 10.0),
            ]);
        }
    }
    odds
}

fn bench_join_time(c: &mut Criterion) {
    let fx = prepare_fixtures(season_fixtures());
    let odds = prepare_odds(season_odds(&season_fixtures()));
    c.bench_function("join_time_season", |b| {
        b.iter(|| {
            let out = join_time(
                black_box(&fx),
                "kickoff_utc",
                black_box(&odds),
                "match_date_utc",
                &JOIN_KEYS,
                4.0,
                Some("fixture_id"),
            );
            black_box(out.len());
        })
    });
}

fn bench_build_master(c: &mut Criterion) {
    let fixtures = season_fixtures();
    let odds = season_odds(&fixtures);
    c.bench_function("build_master_season", |b| {
        b.iter(|| {
            let inputs = JoinInputs {
                fixtures: fixtures.clone(),
                odds: odds.clone(),
                ..JoinInputs::default()
            };
            let result = build_master(black_box(inputs), 4.0);
            black_box(result.qc_lines.len());
        })
    });
}

fn bench_canonical_odds(c: &mut Criterion) {
    let event: Value = serde_json::from_str(EVENT_JSON).expect("valid fixture json");
    let events = vec![event; 200];
    c.bench_function("odds_to_canonical", |b| {
        b.iter(|| {
            let table = to_canonical(black_box(&events));
            black_box(table.len());
        })
    });
}

criterion_group!(benches, bench_join_time, bench_build_master, bench_canonical_odds);
criterion_main!(benches);
