use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Cell {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Time(DateTime<Utc>),
}

impl Cell {
    pub fn str(value: impl Into<String>) -> Self {
        Cell::Str(value.into())
    }

    pub fn opt_str(value: Option<&str>) -> Self {
        value.map(Cell::str).unwrap_or(Cell::Null)
    }

    pub fn is_null(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Cell::Int(i)
                } else {
                    n.as_f64().map(Cell::Float).unwrap_or(Cell::Null)
                }
            }
            Value::String(s) => Cell::Str(s.clone()),
            other => Cell::Str(other.to_string()),
        }
    }

    pub fn from_json_opt(value: Option<&Value>) -> Self {
        value.map(Cell::from_json).unwrap_or(Cell::Null)
    }

    /// Typed reading of a raw CSV field: int, then float, else text. Empty is null.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return Cell::Float(f);
            }
        }
        Cell::Str(raw.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) if !f.is_nan() => Some(*f),
            Cell::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Cell::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Coerces to a UTC time; anything unparseable becomes null.
    pub fn to_time(&self) -> Cell {
        match self {
            Cell::Time(t) => Cell::Time(*t),
            Cell::Str(s) => parse_utc(s).map(Cell::Time).unwrap_or(Cell::Null),
            _ => Cell::Null,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Int(i) => Value::from(*i),
            Cell::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Str(s) => Value::String(s.clone()),
            Cell::Time(_) => Value::String(self.to_string()),
        }
    }

    /// Text used for key matching and string concatenation.
    pub fn text(&self) -> String {
        match self {
            Cell::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) if v.is_nan() => Ok(()),
            Cell::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{v:.1}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Str(s) => write!(f, "{s}"),
            Cell::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S%:z")),
        }
    }
}

pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%dT%H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    let naive = trimmed.trim_end_matches('Z');
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Row-major table with named columns; the tabular currency of the normalize and join steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_columns(columns: &[&str]) -> Self {
        Self::new(columns.iter().map(|c| c.to_string()).collect())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.col_index(name).is_some()
    }

    pub fn col_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.col_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn column(&self, name: &str) -> Vec<Cell> {
        match self.col_index(name) {
            Some(idx) => self.rows.iter().map(|r| r[idx].clone()).collect(),
            None => Vec::new(),
        }
    }

    /// Replaces the column if it exists, appends it otherwise.
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) {
        let idx = match self.col_index(name) {
            Some(idx) => idx,
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(Cell::Null);
                }
                self.columns.len() - 1
            }
        };
        let mut values = values.into_iter();
        for row in &mut self.rows {
            row[idx] = values.next().unwrap_or(Cell::Null);
        }
    }

    pub fn fill_column(&mut self, name: &str, value: Cell) {
        let values = vec![value; self.rows.len()];
        self.set_column(name, values);
    }

    pub fn map_column(&mut self, name: &str, f: impl Fn(&Cell) -> Cell) {
        let Some(idx) = self.col_index(name) else {
            return;
        };
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
    }

    /// Keeps `new_col` if present; otherwise copies the first existing fallback,
    /// otherwise adds an all-null column.
    pub fn ensure_col(&mut self, new_col: &str, from_cols: &[&str]) {
        if self.has_column(new_col) {
            return;
        }
        for from in from_cols {
            if self.has_column(from) {
                let values = self.column(from);
                self.set_column(new_col, values);
                return;
            }
        }
        self.fill_column(new_col, Cell::Null);
    }

    pub fn rename_column(&mut self, from: &str, to: &str) {
        if let Some(idx) = self.col_index(from) {
            self.columns[idx] = to.to_string();
        }
    }

    pub fn drop_columns(&mut self, names: &[&str]) {
        let keep = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !names.contains(&c.as_str()))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        self.columns = keep.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            *row = keep.iter().map(|&i| row[i].clone()).collect();
        }
    }

    /// Projection; names missing from the table come back as null columns.
    pub fn select(&self, names: &[&str]) -> Table {
        let idx = names.iter().map(|n| self.col_index(n)).collect::<Vec<_>>();
        let mut out = Table::with_columns(names);
        for row in &self.rows {
            out.rows.push(
                idx.iter()
                    .map(|i| i.map(|i| row[i].clone()).unwrap_or(Cell::Null))
                    .collect(),
            );
        }
        out
    }

    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Row `i` as a JSON object keyed by column name.
    pub fn record(&self, i: usize) -> Option<Value> {
        let row = self.rows.get(i)?;
        let obj = self
            .columns
            .iter()
            .zip(row)
            .map(|(c, cell)| (c.clone(), cell.to_json()))
            .collect::<serde_json::Map<_, _>>();
        Some(Value::Object(obj))
    }

    pub fn non_null_count(&self, name: &str) -> usize {
        self.column(name).iter().filter(|c| !c.is_null()).count()
    }

    pub fn nunique(&self, name: &str) -> usize {
        self.column(name)
            .iter()
            .filter(|c| !c.is_null())
            .map(|c| c.text())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Share of rows where any of `names` is null (or missing).
    pub fn null_fraction_any(&self, names: &[&str]) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        let idx = names.iter().map(|n| self.col_index(n)).collect::<Vec<_>>();
        let nulls = self
            .rows
            .iter()
            .filter(|row| idx.iter().any(|i| i.is_none_or(|i| row[i].is_null())))
            .count();
        nulls as f64 / self.rows.len() as f64
    }

    pub fn concat(tables: &[Table]) -> Table {
        let mut columns: Vec<String> = Vec::new();
        for t in tables {
            for c in &t.columns {
                if !columns.contains(c) {
                    columns.push(c.clone());
                }
            }
        }
        let names = columns.iter().map(|c| c.as_str()).collect::<Vec<_>>();
        let mut out = Table::with_columns(&names);
        for t in tables {
            out.rows.extend(t.select(&names).rows);
        }
        out
    }

    /// One row per object; columns are the union of keys in first-seen order.
    pub fn from_records(records: &[Value]) -> Table {
        let mut columns: Vec<String> = Vec::new();
        let mut seen = HashMap::new();
        for rec in records {
            if let Some(obj) = rec.as_object() {
                for key in obj.keys() {
                    if !seen.contains_key(key) {
                        seen.insert(key.clone(), columns.len());
                        columns.push(key.clone());
                    }
                }
            }
        }
        let mut out = Table::new(columns);
        for rec in records {
            let Some(obj) = rec.as_object() else {
                continue;
            };
            let mut row = vec![Cell::Null; out.width()];
            for (key, value) in obj {
                if let Some(&idx) = seen.get(key) {
                    row[idx] = Cell::from_json(value);
                }
            }
            out.rows.push(row);
        }
        out
    }

    pub fn from_csv_reader<R: Read>(rdr: R) -> Result<Table> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
        let headers = reader.headers().context("read csv header")?.clone();
        let mut out = Table::new(dedup_names(headers.iter()));
        for record in reader.records() {
            let record = record.context("read csv record")?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            out.push_row(record.iter().map(Cell::infer).collect());
        }
        Ok(out)
    }

    pub fn from_csv_str(raw: &str) -> Result<Table> {
        Self::from_csv_reader(raw.trim_start_matches('\u{feff}').as_bytes())
    }

    pub fn read_csv(path: &Path) -> Result<Table> {
        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_csv_str(&raw)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let mut writer =
            csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
        writer.write_record(&self.columns).context("write csv header")?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(|c| c.text()))
                .context("write csv row")?;
        }
        writer.flush().context("flush csv")?;
        Ok(())
    }

    /// Right-aligned text rendering without an index column.
    pub fn render(&self, max_rows: usize) -> String {
        let shown = self.rows.iter().take(max_rows).collect::<Vec<_>>();
        let cells = shown
            .iter()
            .map(|row| row.iter().map(render_cell).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        let widths = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                cells
                    .iter()
                    .map(|r| r[i].chars().count())
                    .chain(std::iter::once(c.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect::<Vec<_>>();
        let mut lines = Vec::with_capacity(cells.len() + 1);
        lines.push(join_padded(self.columns.iter().map(|c| c.as_str()), &widths));
        for row in &cells {
            lines.push(join_padded(row.iter().map(|c| c.as_str()), &widths));
        }
        lines.join("\n")
    }
}

fn render_cell(cell: &Cell) -> String {
    match cell {
        Cell::Null => "None".to_string(),
        Cell::Float(v) if v.is_nan() => "NaN".to_string(),
        other => other.to_string(),
    }
}

fn join_padded<'a>(values: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    values
        .zip(widths)
        .map(|(v, &w)| format!("{v:>w$}"))
        .collect::<Vec<_>>()
        .join("  ")
}

pub(crate) fn dedup_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();
    for name in names {
        let name = name.trim().to_string();
        let count = seen.entry(name.clone()).or_insert(0);
        if *count == 0 {
            out.push(name);
        } else {
            out.push(format!("{name}.{count}"));
        }
        *count += 1;
    }
    out
}
