use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::cli::Outcome;
use crate::config::env_or;
use crate::http_client::{Request, get_text_with_retry, is_blocked};
use crate::report::print_fields;
use crate::snapshot::SnapshotStore;
use crate::table::{Cell, Table, dedup_names};

pub const SOURCE: &str = "fbref";

const DEFAULT_URL: &str = "https://fbref.com/en/comps/9/stats/Premier-League-Stats";

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .ok()
        .with_context(|| format!("invalid selector {css}"))
}

fn cell_texts(row: ElementRef<'_>, cells: &Selector) -> Vec<String> {
    row.select(cells)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .collect()
}

/// Every `<table>` in the page. The second row is the header when there is one
/// (fbref puts a group-heading row above the column names); rows repeating the
/// header are dropped.
pub fn parse_tables(html: &str) -> Result<Vec<Table>> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("th, td")?;

    let mut out = Vec::new();
    for table in document.select(&table_sel) {
        let rows = table
            .select(&row_sel)
            .map(|row| cell_texts(row, &cell_sel))
            .filter(|cells| !cells.is_empty())
            .collect::<Vec<_>>();
        let header_idx = if rows.len() > 1 { 1 } else { 0 };
        let Some(header) = rows.get(header_idx) else {
            continue;
        };
        let mut parsed = Table::new(dedup_names(header.iter().map(|h| h.as_str())));
        for row in rows.iter().skip(header_idx + 1) {
            if row == header {
                continue;
            }
            parsed.push_row(row.iter().map(|v| Cell::infer(v)).collect());
        }
        out.push(parsed);
    }
    Ok(out)
}

/// The table with the most cells; ties keep the earliest.
pub fn largest_table(tables: Vec<Table>) -> Option<Table> {
    let mut best: Option<Table> = None;
    for table in tables {
        let size = table.len() * table.width();
        if best.as_ref().is_none_or(|b| size > b.len() * b.width()) {
            best = Some(table);
        }
    }
    best
}

pub fn run(store: &SnapshotStore) -> Result<Outcome> {
    let url = env_or("FBREF_LEAGUE_URL", DEFAULT_URL);
    let html = match get_text_with_retry(&url, &Request::new()) {
        Ok(html) => html,
        Err(err) if is_blocked(&err) => {
            return Ok(Outcome::Skipped(format!(
                "fbref refused the request ({err:#}); skipping this run"
            )));
        }
        Err(err) => return Err(err),
    };
    store.dump_text(SOURCE, "page.html", &html)?;

    let tables = parse_tables(&html)?;
    let found = tables.len();
    let table = largest_table(tables).context("no tables found on fbref page")?;
    println!(
        "fbref tables found={found}, chosen rows={}, cols={}",
        table.len(),
        table.width()
    );
    let first = table.record(0).into_iter().collect::<Vec<_>>();
    print_fields("fbref chosen table columns", &Value::from(first));
    println!("\nexample values:");
    println!("{}", table.render(5));
    Ok(Outcome::Complete)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn largest_table_prefers_more_cells() {
        let mut small = Table::with_columns(&["a"]);
        small.push_row(vec![Cell::Int(1)]);
        let mut big = Table::with_columns(&["a", "b"]);
        big.push_row(vec![Cell::Int(1), Cell::Int(2)]);
        let picked = largest_table(vec![small, big]).unwrap();
        assert_eq!(picked.width(), 2);
        assert!(largest_table(Vec::new()).is_none());
    }
}
