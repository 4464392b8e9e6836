use std::collections::HashSet;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::DateTime;
use parquet::column::writer::ColumnWriter;
use parquet::data_type::ByteArray;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::SerializedFileWriter;
use parquet::record::Field;
use parquet::schema::parser::parse_message_type;

use crate::table::{Cell, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Int,
    Double,
    Timestamp,
    Utf8,
}

impl ColumnKind {
    fn field_decl(self, name: &str) -> String {
        match self {
            ColumnKind::Bool => format!("OPTIONAL BOOLEAN {name};"),
            ColumnKind::Int => format!("OPTIONAL INT64 {name};"),
            ColumnKind::Double => format!("OPTIONAL DOUBLE {name};"),
            ColumnKind::Timestamp => format!("OPTIONAL INT64 {name} (TIMESTAMP_MILLIS);"),
            ColumnKind::Utf8 => format!("OPTIONAL BYTE_ARRAY {name} (UTF8);"),
        }
    }
}

fn infer_kind<'a>(cells: impl Iterator<Item = &'a Cell>) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for cell in cells {
        let this = match cell {
            c if c.is_null() => continue,
            Cell::Bool(_) => ColumnKind::Bool,
            Cell::Int(_) => ColumnKind::Int,
            Cell::Float(_) => ColumnKind::Double,
            Cell::Time(_) => ColumnKind::Timestamp,
            _ => ColumnKind::Utf8,
        };
        kind = Some(match (kind, this) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(ColumnKind::Int), ColumnKind::Double)
            | (Some(ColumnKind::Double), ColumnKind::Int) => ColumnKind::Double,
            _ => ColumnKind::Utf8,
        });
    }
    kind.unwrap_or(ColumnKind::Utf8)
}

fn sanitize_names(columns: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(columns.len());
    for (i, raw) in columns.iter().enumerate() {
        let mut name: String = raw
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '.' { c } else { '_' })
            .collect();
        if name.is_empty() {
            name = format!("col_{i}");
        }
        while !seen.insert(name.clone()) {
            name.push('_');
        }
        out.push(name);
    }
    out
}

pub fn write_parquet(table: &Table, path: &Path) -> Result<()> {
    if table.width() == 0 {
        return Err(anyhow!("cannot write parquet without columns"));
    }
    let kinds = (0..table.width())
        .map(|i| infer_kind(table.rows().iter().map(|r| &r[i])))
        .collect::<Vec<_>>();
    let names = sanitize_names(table.columns());
    let fields = names
        .iter()
        .zip(&kinds)
        .map(|(name, kind)| kind.field_decl(name))
        .collect::<Vec<_>>();
    let message = format!("message schema {{ {} }}", fields.join(" "));
    let schema = Arc::new(parse_message_type(&message).context("build parquet schema")?);
    let props = Arc::new(WriterProperties::builder().build());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer =
        SerializedFileWriter::new(file, schema, props).context("open parquet writer")?;
    let mut row_group = writer.next_row_group().context("start parquet row group")?;

    let mut col_idx = 0usize;
    while let Some(mut column) = row_group.next_column().context("next parquet column")? {
        let kind = kinds[col_idx];
        let cells = table.rows().iter().map(|r| &r[col_idx]).collect::<Vec<_>>();
        match column.untyped() {
            ColumnWriter::BoolColumnWriter(w) => {
                let (values, defs) = split_levels(cells.iter().map(|c| match c {
                    Cell::Bool(b) => Some(*b),
                    _ => None,
                }));
                w.write_batch(&values, Some(&defs), None)
                    .context("write bool column")?;
            }
            ColumnWriter::Int64ColumnWriter(w) => {
                let (values, defs) = split_levels(cells.iter().map(|c| match (kind, c) {
                    (ColumnKind::Timestamp, Cell::Time(t)) => Some(t.timestamp_millis()),
                    (_, Cell::Int(i)) => Some(*i),
                    _ => None,
                }));
                w.write_batch(&values, Some(&defs), None)
                    .context("write int64 column")?;
            }
            ColumnWriter::DoubleColumnWriter(w) => {
                let (values, defs) = split_levels(cells.iter().map(|c| c.as_f64()));
                w.write_batch(&values, Some(&defs), None)
                    .context("write double column")?;
            }
            ColumnWriter::ByteArrayColumnWriter(w) => {
                let (values, defs) = split_levels(cells.iter().map(|c| {
                    if c.is_null() {
                        None
                    } else {
                        Some(ByteArray::from(c.text().as_str()))
                    }
                }));
                w.write_batch(&values, Some(&defs), None)
                    .context("write utf8 column")?;
            }
            _ => return Err(anyhow!("unexpected parquet column type at {col_idx}")),
        }
        column.close().context("close parquet column")?;
        col_idx += 1;
    }
    row_group.close().context("close parquet row group")?;
    writer.close().context("close parquet writer")?;
    Ok(())
}

fn split_levels<T>(values: impl Iterator<Item = Option<T>>) -> (Vec<T>, Vec<i16>) {
    let mut present = Vec::new();
    let mut defs = Vec::new();
    for value in values {
        match value {
            Some(v) => {
                present.push(v);
                defs.push(1);
            }
            None => defs.push(0),
        }
    }
    (present, defs)
}

pub fn read_parquet(path: &Path) -> Result<Table> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("open parquet reader")?;
    let columns = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect::<Vec<_>>();
    let mut table = Table::new(columns.clone());
    let iter = reader.get_row_iter(None).context("iterate parquet rows")?;
    for row in iter {
        let row = row.context("decode parquet row")?;
        let mut cells = vec![Cell::Null; columns.len()];
        for (name, field) in row.get_column_iter() {
            if let Some(idx) = columns.iter().position(|c| c == name) {
                cells[idx] = field_to_cell(field);
            }
        }
        table.push_row(cells);
    }
    Ok(table)
}

/// Missing file reads as an empty table.
pub fn read_parquet_or_empty(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Ok(Table::default());
    }
    read_parquet(path)
}

fn field_to_cell(field: &Field) -> Cell {
    match field {
        Field::Null => Cell::Null,
        Field::Bool(b) => Cell::Bool(*b),
        Field::Byte(v) => Cell::Int(*v as i64),
        Field::Short(v) => Cell::Int(*v as i64),
        Field::Int(v) => Cell::Int(*v as i64),
        Field::Long(v) => Cell::Int(*v),
        Field::UByte(v) => Cell::Int(*v as i64),
        Field::UShort(v) => Cell::Int(*v as i64),
        Field::UInt(v) => Cell::Int(*v as i64),
        Field::ULong(v) => i64::try_from(*v).map(Cell::Int).unwrap_or(Cell::Float(*v as f64)),
        Field::Float(v) => Cell::Float(*v as f64),
        Field::Double(v) => Cell::Float(*v),
        Field::Str(s) => Cell::Str(s.clone()),
        Field::TimestampMillis(ms) => DateTime::from_timestamp_millis(*ms)
            .map(Cell::Time)
            .unwrap_or(Cell::Null),
        Field::TimestampMicros(us) => DateTime::from_timestamp_micros(*us)
            .map(Cell::Time)
            .unwrap_or(Cell::Null),
        other => Cell::Str(other.to_string()),
    }
}
