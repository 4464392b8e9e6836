//! Flattening of raw snapshots into typed tables for the join step.

pub mod api_football;
pub mod fdorg;
pub mod odds_canonical;

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::Value;

use crate::snapshot::{latest_dated_dir, load_json, matching_files};
use crate::table::Cell;

/// Latest `<raw>/<source>/<day>/` directory, if any snapshot exists.
pub fn latest_source_dir(raw: &Path, source: &str) -> Option<PathBuf> {
    latest_dated_dir(&raw.join(source))
}

/// First file (by name) in `dir` matching `prefix*suffix`.
pub fn first_match(dir: &Path, prefix: &str, suffix: &str) -> Option<PathBuf> {
    matching_files(dir, prefix, suffix).into_iter().next()
}

pub fn load_payload(path: &Path) -> Result<Value> {
    log::info!("reading {}", path.display());
    load_json(path)
}

/// Cell at a nested path; missing or null steps give `Cell::Null`.
pub fn cell_at(value: &Value, path: &[&str]) -> Cell {
    Cell::from_json_opt(crate::sources::value_at(value, path))
}
