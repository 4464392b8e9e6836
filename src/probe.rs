//! Offline summaries over the raw snapshot tree: item counts per source and a
//! per-file schema listing.

use std::fs;
use std::path::Path;

use anyhow::Result;
use serde_json::Value;

use crate::report::{format_keys, short_obs};
use crate::snapshot::{latest_dated_dir, load_json, matching_files};
use crate::sources::flatten_record;
use crate::table::Table;

const LIST_KEYS: [&str; 5] = ["response", "matches", "competitions", "standings", "scorers"];
const SCHEMA_MAX_FILES: usize = 8;
const SCHEMA_MAX_COLUMNS: usize = 30;

/// Items in a parsed snapshot: list length, or the first list under a known key.
pub fn count_items(value: &Value) -> usize {
    match value {
        Value::Array(list) => list.len(),
        Value::Object(obj) => LIST_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(|v| v.as_array()))
            .map(|list| list.len())
            .unwrap_or(0),
        _ => 0,
    }
}

/// Sum of items across the JSON files of the latest dated directory under `source_dir`.
pub fn count_json_items(source_dir: &Path, name_contains: Option<&str>) -> usize {
    let Some(latest) = latest_dated_dir(source_dir) else {
        return 0;
    };
    matching_files(&latest, "", ".json")
        .iter()
        .filter(|p| {
            name_contains.is_none_or(|needle| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.contains(needle))
            })
        })
        .filter_map(|p| match load_json(p) {
            Ok(value) => Some(count_items(&value)),
            Err(err) => {
                log::debug!("skipping {}: {err:#}", p.display());
                None
            }
        })
        .sum()
}

/// Files one level below the dated directories of `source_dir`.
fn count_dated_files(source_dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(source_dir) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .map(|dir| {
            fs::read_dir(dir)
                .map(|files| {
                    files
                        .filter_map(|e| e.ok())
                        .filter(|e| {
                            let name = e.file_name();
                            let name = name.to_string_lossy();
                            e.path().is_file() && name.contains('.')
                        })
                        .count()
                })
                .unwrap_or(0)
        })
        .sum()
}

pub fn capabilities_lines(raw: &Path) -> Vec<String> {
    let count = |source: &str, needle: Option<&str>| count_json_items(&raw.join(source), needle);
    vec![
        format!("odds_api events: {}", count("odds_api", None)),
        format!("football_data rows: {}", count("football_data", None)),
        format!("statsbomb_open objects: {}", count("statsbomb_open", None)),
        format!("understat rows: {}", count("understat", None)),
        format!("fbref files: {}", count_dated_files(&raw.join("fbref"))),
        format!("openligadb matches: {}", count("openligadb", None)),
        format!("api_football fixtures: {}", count("api_football", Some("fixtures"))),
        format!("api_football injuries: {}", count("api_football", Some("injuries"))),
        format!("api_football odds: {}", count("api_football", Some("odds"))),
        format!("footballdata matches: {}", count("footballdata", Some("matches"))),
        format!("footballdata standings: {}", count("footballdata", Some("standings"))),
        format!("footballdata scorers: {}", count("footballdata", Some("scorers"))),
    ]
}

pub fn run_capabilities(raw: &Path) {
    short_obs("capabilities summary (today)", &capabilities_lines(raw));
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRow {
    pub file: String,
    /// `-1` when the file could not be read or parsed.
    pub rows: i64,
    pub cols: i64,
    pub columns: Vec<String>,
}

pub fn schema_of(value: &Value) -> (i64, i64, Vec<String>) {
    let table = match value {
        Value::Array(list) if list.first().is_some_and(Value::is_object) => {
            Table::from_records(list)
        }
        Value::Object(_) => Table::from_records(&[flatten_record(value)]),
        _ => return (0, 0, Vec::new()),
    };
    (
        table.len() as i64,
        table.width() as i64,
        table.columns().to_vec(),
    )
}

/// First eight JSON files of `dir`, sorted by name.
pub fn summarize_json_records(dir: &Path) -> Vec<SchemaRow> {
    matching_files(dir, "", ".json")
        .into_iter()
        .take(SCHEMA_MAX_FILES)
        .map(|path| {
            let file = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match load_json(&path) {
                Ok(value) => {
                    let (rows, cols, columns) = schema_of(&value);
                    SchemaRow {
                        file,
                        rows,
                        cols,
                        columns,
                    }
                }
                Err(_) => SchemaRow {
                    file,
                    rows: -1,
                    cols: -1,
                    columns: Vec::new(),
                },
            }
        })
        .collect()
}

pub fn format_columns(columns: &[String]) -> String {
    let shown = &columns[..columns.len().min(SCHEMA_MAX_COLUMNS)];
    let more = if columns.len() > SCHEMA_MAX_COLUMNS { " ..." } else { "" };
    format!("{}{more}", format_keys(shown))
}

/// Returns `false` when there is no raw tree yet.
pub fn run_schema_report(raw: &Path) -> Result<bool> {
    if !raw.exists() {
        println!("no {} yet — run pulls first", raw.display());
        return Ok(false);
    }
    let mut sources = fs::read_dir(raw)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect::<Vec<_>>();
    sources.sort();

    for source in sources {
        let Some(dated) = latest_dated_dir(&source) else {
            continue;
        };
        let source_name = source.file_name().map(|n| n.to_string_lossy().into_owned());
        let day = dated.file_name().map(|n| n.to_string_lossy().into_owned());
        println!("\n{}", "=".repeat(80));
        println!(
            "schema report — source: {}, date: {}",
            source_name.unwrap_or_default(),
            day.unwrap_or_default()
        );
        println!("{}", "=".repeat(80));
        for row in summarize_json_records(&dated) {
            println!("\n{}: rows={}, cols={}", row.file, row.rows, row.cols);
            if !row.columns.is_empty() {
                println!("columns: {}", format_columns(&row.columns));
            }
        }
    }
    Ok(true)
}
