use anyhow::{Context, Result};
use serde_json::Value;

use crate::cli::Outcome;
use crate::config::env_or;
use crate::http_client::{Request, get_text};
use crate::report::{print_fields, short_obs};
use crate::snapshot::SnapshotStore;
use crate::table::Table;

pub const SOURCE: &str = "football_data";

const DEFAULT_URL: &str = "https://www.football-data.co.uk/mmz4281/2425/E0.csv";

/// Closing-odds columns from Pinnacle, Bet365 and William Hill.
pub const ODDS_COLUMNS: [&str; 9] = [
    "PSCH", "PSCD", "PSCA", "B365H", "B365D", "B365A", "WHH", "WHD", "WHA",
];

/// `.../mmz4281/2425/E0.csv` is saved as `E0_2425.csv`.
pub fn snapshot_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let mut parts = path.rsplit('/').filter(|p| !p.is_empty());
    let file = parts.next().unwrap_or("download.csv");
    let stem = file.strip_suffix(".csv").unwrap_or(file);
    match parts.next() {
        Some(season) if season.chars().all(|c| c.is_ascii_digit()) => {
            format!("{stem}_{season}.csv")
        }
        _ => format!("{stem}.csv"),
    }
}

pub fn odds_column_counts(table: &Table) -> Vec<String> {
    ODDS_COLUMNS
        .iter()
        .filter(|c| table.has_column(c))
        .map(|c| format!("{c} non-null={}", table.non_null_count(c)))
        .collect()
}

pub fn run(store: &SnapshotStore) -> Result<Outcome> {
    let url = env_or("FOOTBALL_DATA_CSV_URL", DEFAULT_URL);
    let body = get_text(&url, &Request::new().timeout_secs(25))?;
    store.dump_text(SOURCE, &snapshot_name(&url), &body)?;

    let table = Table::from_csv_str(&body).context("parse football-data csv")?;
    println!(
        "\nfootball-data rows={}, cols={}",
        table.len(),
        table.width()
    );
    let first = table.record(0).into_iter().collect::<Vec<_>>();
    print_fields("football-data columns (soccer)", &Value::from(first));
    for line in odds_column_counts(&table) {
        short_obs("odds column sample", &[line]);
    }
    Ok(Outcome::Complete)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_name_uses_season_dir() {
        assert_eq!(snapshot_name(DEFAULT_URL), "E0_2425.csv");
        assert_eq!(
            snapshot_name("https://www.football-data.co.uk/mmz4281/2324/D1.csv"),
            "D1_2324.csv"
        );
        assert_eq!(snapshot_name("https://example.test/data/latest.csv"), "latest.csv");
    }

    #[test]
    fn counts_only_present_odds_columns() {
        let table = Table::from_csv_str("HomeTeam,B365H,PSCH\nArsenal,1.5,\nChelsea,2.1,2.0\n")
            .unwrap();
        assert_eq!(
            odds_column_counts(&table),
            vec!["PSCH non-null=1", "B365H non-null=2"]
        );
    }
}
