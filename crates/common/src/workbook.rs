//! Directory-backed report workbook
//!
//! Each sheet is written as `<dir>/<sheet>.csv`. A sheet made of several
//! sections writes one `<dir>/<sheet>.<section>.csv` per section. Every
//! sheet is also mirrored into `<dir>/workbook.json` so the whole report
//! can be consumed in one read. Sheets written by earlier runs are kept.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::Result;
use crate::table::{Cell, Table};

pub const ACCOUNT_SUMMARY: &str = "Account_Summary";
pub const FILTERED_TRANSACTIONS: &str = "Filtered_Transactions";
pub const HIGH_VALUE_CREDITS: &str = "High_Value_Credits";
pub const TRANSFER_DETAILS: &str = "Transfer_Details";
pub const API_DATA_VALIDATION: &str = "API_Data_Validation";

const TRANSACTIONS_PREFIX: &str = "Transactions_";
const INDEX_FILE: &str = "workbook.json";

/// Sheet name holding one account's scraped history
pub fn transactions_sheet(account_id: &str) -> String {
    format!("{}{}", TRANSACTIONS_PREFIX, account_id)
}

/// Report workbook rooted at a directory
#[derive(Debug)]
pub struct Workbook {
    dir: PathBuf,
    index: Map<String, Value>,
}

impl Workbook {
    /// Open (creating if needed) the workbook directory, keeping any
    /// sheets already indexed there
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let index_path = dir.join(INDEX_FILE);
        let index = if index_path.exists() {
            let content = fs::read_to_string(&index_path)?;
            match serde_json::from_str::<Value>(&content)? {
                Value::Object(map) => map,
                _ => Map::new(),
            }
        } else {
            Map::new()
        };

        Ok(Self { dir, index })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a single-table sheet
    pub fn write_sheet(&mut self, name: &str, table: &Table) -> Result<PathBuf> {
        let path = self.dir.join(format!("{}.csv", name));
        write_csv(&path, table)?;
        self.index.insert(name.to_string(), serde_json::to_value(table)?);
        debug!(sheet = name, rows = table.len(), "Wrote sheet");
        Ok(path)
    }

    /// Write a sheet made of named sections, in the given order
    pub fn write_sections(&mut self, name: &str, sections: &[(&str, &Table)]) -> Result<()> {
        let mut value = Map::new();
        for (section, table) in sections {
            let path = self.dir.join(format!("{}.{}.csv", name, section));
            write_csv(&path, table)?;
            value.insert(section.to_string(), serde_json::to_value(table)?);
        }
        self.index.insert(name.to_string(), Value::Object(value));
        debug!(sheet = name, sections = sections.len(), "Wrote sectioned sheet");
        Ok(())
    }

    /// Flush the JSON index
    pub fn save(&self) -> Result<PathBuf> {
        let path = self.dir.join(INDEX_FILE);
        let content = serde_json::to_string_pretty(&self.index)?;
        fs::write(&path, content)?;
        info!("Workbook saved to {}", self.dir.display());
        Ok(path)
    }

    /// Load a previously written single-table sheet as text cells.
    /// Returns `None` when the sheet was never written.
    pub fn read_sheet(&self, name: &str) -> Result<Option<Table>> {
        let path = self.dir.join(format!("{}.csv", name));
        if !path.exists() {
            return Ok(None);
        }
        read_csv(&path).map(Some)
    }
}

fn write_csv(path: &Path, table: &Table) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(File::create(path)?);
    if !table.columns().is_empty() {
        writer.write_record(table.columns())?;
        for row in table.cell_rows() {
            writer.write_record(row.iter().map(Cell::to_string))?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let cell = match record.get(idx) {
                    Some(value) if !value.is_empty() => Cell::from(value),
                    _ => Cell::Empty,
                };
                (name.clone(), cell)
            })
            .collect();
        records.push(row);
    }

    let mut table = Table::new(headers);
    for record in records {
        table.push_record(record);
    }
    Ok(table)
}
