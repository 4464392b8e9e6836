use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;

use crate::table::{Cell, Table};

/// `source,source_team,canonical_team` lookup; the first mapping for a name wins.
#[derive(Debug, Clone, Default)]
pub struct TeamDictionary {
    by_source: HashMap<String, HashMap<String, String>>,
}

impl TeamDictionary {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!(
                "team dictionary {} not found; names pass through unchanged",
                path.display()
            );
            return Ok(Self::default());
        }
        let table = Table::read_csv(path)?;
        Ok(Self::from_table(&table))
    }

    pub fn from_table(table: &Table) -> Self {
        let mut dict = Self::default();
        for i in 0..table.len() {
            let get = |col: &str| table.get(i, col).map(Cell::text).unwrap_or_default();
            let source = get("source");
            let source_team = get("source_team");
            let canonical = get("canonical_team");
            if source.is_empty() || source_team.is_empty() || canonical.is_empty() {
                continue;
            }
            dict.insert(&source, &source_team, &canonical);
        }
        dict
    }

    pub fn insert(&mut self, source: &str, source_team: &str, canonical: &str) {
        self.by_source
            .entry(source.to_string())
            .or_default()
            .entry(source_team.to_string())
            .or_insert_with(|| canonical.to_string());
    }

    pub fn lookup(&self, source: &str, team: &str) -> Option<&str> {
        self.by_source
            .get(source)
            .and_then(|m| m.get(team))
            .map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.values().all(|m| m.is_empty())
    }

    /// Adds `<src_col>_canonical`: the dictionary name, or the original when unmapped.
    pub fn canonicalize(&self, table: &mut Table, source: &str, src_col: &str) {
        self.canonicalize_into(table, source, src_col, &format!("{src_col}_canonical"));
    }

    pub fn canonicalize_into(&self, table: &mut Table, source: &str, src_col: &str, out_col: &str) {
        if !table.has_column(src_col) {
            return;
        }
        let values = table
            .column(src_col)
            .into_iter()
            .map(|cell| match cell.as_str().and_then(|t| self.lookup(source, t)) {
                Some(canonical) => Cell::str(canonical),
                None => cell,
            })
            .collect();
        table.set_column(out_col, values);
    }
}

pub fn norm_name(cell: &Cell) -> String {
    cell.text().trim().to_lowercase()
}
