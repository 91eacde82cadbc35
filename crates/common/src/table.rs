//! Tabular datasets exchanged between scrapers, the API harvest,
//! reconciliation and the workbook writer.
//!
//! Column names are whatever the producer chose (portal display names,
//! camelCase API fields, canonical snake_case). A [`Table`] keeps the
//! column order stable so it renders the same way every run.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::money::parse_money;

/// A single named value in a row
pub type Field = (String, Cell);

/// An ordered set of named values, one per column
pub type Record = Vec<Field>;

/// One cell of a dataset
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(Decimal),
    Integer(i64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric view of the cell. Currency text is parsed; text without a
    /// digit (blank, `N/A`, `--`) has no numeric value.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Cell::Number(d) => Some(*d),
            Cell::Integer(i) => Some(Decimal::from(*i)),
            Cell::Text(s) if s.chars().any(|c| c.is_ascii_digit()) => parse_money(s).ok(),
            _ => None,
        }
    }

    /// String-normalized join key. `800002`, `"800002"` and `800002.0`
    /// all yield `"800002"`.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else if let Some(whole) = s.strip_suffix(".0") {
                    if !whole.is_empty() && whole.chars().all(|c| c.is_ascii_digit()) {
                        Some(whole.to_string())
                    } else {
                        Some(s.to_string())
                    }
                } else {
                    Some(s.to_string())
                }
            }
            Cell::Number(d) => Some(d.normalize().to_string()),
            Cell::Integer(i) => Some(i.to_string()),
            Cell::Date(d) => Some(d.to_string()),
            Cell::DateTime(dt) => Some(dt.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(d) => write!(f, "{}", d),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M")),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Empty => serializer.serialize_none(),
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Number(d) => match d.to_f64() {
                Some(v) => serializer.serialize_f64(v),
                None => serializer.collect_str(d),
            },
            Cell::Integer(i) => serializer.serialize_i64(*i),
            Cell::Date(_) | Cell::DateTime(_) => serializer.collect_str(self),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<Decimal> for Cell {
    fn from(d: Decimal) -> Self {
        Cell::Number(d)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Integer(i)
    }
}

impl From<usize> for Cell {
    fn from(n: usize) -> Self {
        Cell::Integer(n as i64)
    }
}

impl From<NaiveDate> for Cell {
    fn from(d: NaiveDate) -> Self {
        Cell::Date(d)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(dt: NaiveDateTime) -> Self {
        Cell::DateTime(dt)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Empty)
    }
}

/// Build a [`Field`] from anything convertible into a [`Cell`]
pub fn field(name: &str, value: impl Into<Cell>) -> Field {
    (name.to_string(), value.into())
}

/// A column-ordered dataset of uniform rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given header
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table from records. The header is the union of all record
    /// keys in first-seen order; absent values are left empty.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut table = Table::default();
        for record in records {
            table.push_record(record);
        }
        table
    }

    /// One-row explanatory table used in place of a dataset that could not
    /// be produced
    pub fn diagnostic(record: Record) -> Self {
        Self::from_records([record])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a record, widening the header for unseen keys
    pub fn push_record(&mut self, record: Record) {
        let mut row = vec![Cell::Empty; self.columns.len()];
        for (name, value) in record {
            match self.column_index(&name) {
                Some(idx) => row[idx] = value,
                None => {
                    self.columns.push(name);
                    for existing in &mut self.rows {
                        existing.push(Cell::Empty);
                    }
                    row.push(value);
                }
            }
        }
        self.rows.push(row);
    }

    /// Rename a column. Returns false when `from` is absent or `to` is
    /// already taken by another column.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return self.has_column(from);
        }
        if self.has_column(to) {
            return false;
        }
        match self.column_index(from) {
            Some(idx) => {
                self.columns[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Set `name` to `value` on every row, adding the column if needed
    pub fn set_column(&mut self, name: &str, value: impl Into<Cell>) {
        let value = value.into();
        match self.column_index(name) {
            Some(idx) => {
                for row in &mut self.rows {
                    row[idx] = value.clone();
                }
            }
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(value.clone());
                }
            }
        }
    }

    /// Cell at `row` for the named column; missing columns read as empty
    pub fn get(&self, row: usize, column: &str) -> &Cell {
        static EMPTY: Cell = Cell::Empty;
        match (self.rows.get(row), self.column_index(column)) {
            (Some(cells), Some(idx)) => &cells[idx],
            _ => &EMPTY,
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(move |cells| RowRef {
            columns: &self.columns,
            cells,
        })
    }

    /// Keep only rows for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(RowRef<'_>) -> bool) {
        let columns = &self.columns;
        self.rows.retain(|cells| keep(RowRef { columns, cells }));
    }

    /// Owned records, one per row
    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|cells| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(cells.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Raw cell grid in column order
    pub fn cell_rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }
}

/// Borrowed view of one row
#[derive(Clone, Copy)]
pub struct RowRef<'a> {
    columns: &'a [String],
    cells: &'a [Cell],
}

impl<'a> RowRef<'a> {
    pub fn get(&self, column: &str) -> &'a Cell {
        static EMPTY: Cell = Cell::Empty;
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.cells.get(idx))
            .unwrap_or(&EMPTY)
    }

    pub fn cells(&self) -> &'a [Cell] {
        self.cells
    }

    pub fn to_record(&self) -> Record {
        self.columns
            .iter()
            .cloned()
            .zip(self.cells.iter().cloned())
            .collect()
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&RowMap {
                columns: &self.columns,
                cells: row,
            })?;
        }
        seq.end()
    }
}

struct RowMap<'a> {
    columns: &'a [String],
    cells: &'a [Cell],
}

impl Serialize for RowMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, cell) in self.columns.iter().zip(self.cells) {
            map.serialize_entry(name, cell)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_as_decimal_needs_a_digit() {
        assert_eq!(Cell::from("$1,250.50").as_decimal(), Some(dec!(1250.50)));
        assert_eq!(Cell::from("(12.00)").as_decimal(), Some(dec!(-12.00)));
        assert_eq!(Cell::from("N/A").as_decimal(), None);
        assert_eq!(Cell::from(" -- ").as_decimal(), None);
        assert_eq!(Cell::from("").as_decimal(), None);
    }

    #[test]
    fn test_from_records_unions_columns() {
        let table = Table::from_records([
            vec![field("account_id", "1"), field("balance", dec!(10))],
            vec![field("account_id", "2"), field("note", "late")],
        ]);

        assert_eq!(table.columns(), &["account_id", "balance", "note"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "note"), &Cell::Empty);
        assert_eq!(table.get(1, "balance"), &Cell::Empty);
        assert_eq!(table.get(1, "note"), &Cell::from("late"));
    }

    #[test]
    fn test_rename_refuses_collisions() {
        let mut table = Table::new(["Account ID", "account_id"]);
        assert!(!table.rename_column("Account ID", "account_id"));
        assert!(table.rename_column("Account ID", "acct"));
        assert!(!table.rename_column("missing", "x"));
    }

    #[test]
    fn test_cell_coercions() {
        assert_eq!(Cell::from("$1,234.56").as_decimal(), Some(dec!(1234.56)));
        assert_eq!(Cell::from("n/a?").as_decimal(), Some(Decimal::ZERO));
        assert_eq!(Cell::from("").as_decimal(), None);
        assert_eq!(Cell::Integer(3).as_decimal(), Some(dec!(3)));

        assert_eq!(Cell::from(" 800002 ").as_key().as_deref(), Some("800002"));
        assert_eq!(Cell::from("800002.0").as_key().as_deref(), Some("800002"));
        assert_eq!(Cell::Number(dec!(800002.0)).as_key().as_deref(), Some("800002"));
        assert_eq!(Cell::Integer(800002).as_key().as_deref(), Some("800002"));
        assert_eq!(Cell::Empty.as_key(), None);
    }

    #[test]
    fn test_serializes_as_array_of_objects() {
        let table = Table::from_records([vec![
            field("account_id", "1"),
            field("variance", Cell::Empty),
            field("count", 2usize),
        ]]);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"account_id": "1", "variance": null, "count": 2}])
        );
    }

    #[test]
    fn test_set_column_and_retain() {
        let mut table = Table::from_records([
            vec![field("id", "a")],
            vec![field("id", "")],
        ]);
        table.set_column("data_source", "Web Only (API Empty)");
        assert_eq!(table.get(1, "data_source"), &Cell::from("Web Only (API Empty)"));

        table.retain(|row| !row.get("id").is_empty());
        assert_eq!(table.len(), 1);
    }
}
