//! Output formatting for CLI

use bankrecon_common::{Cell, Table as Dataset};
use bankrecon_recon::ReconciliationReport;
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell as TableCell, Color, ContentArrangement, Table};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Render a dataset as a terminal table
pub fn render_table(dataset: &Dataset) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(dataset.columns());
    for row in dataset.cell_rows() {
        table.add_row(row.iter().map(styled_cell));
    }
    table
}

fn styled_cell(cell: &Cell) -> TableCell {
    let text = cell.to_string();
    let color = match text.as_str() {
        "Match" | "Success" => Some(Color::Green),
        "Variance" => Some(Color::Yellow),
        "DataMissing" => Some(Color::Cyan),
        _ if text.starts_with("API Only") || text.starts_with("Web Only") => Some(Color::Cyan),
        _ if text.starts_with("Skipped") || text == "API Unavailable" => Some(Color::Red),
        _ => None,
    };
    match color {
        Some(color) => TableCell::new(text).fg(color),
        None => TableCell::new(text),
    }
}

/// Print a named dataset
pub fn print_dataset(name: &str, dataset: &Dataset, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            println!("{}", name.bold());
            if dataset.columns().is_empty() {
                println!("No rows.");
            } else {
                println!("{}", render_table(dataset));
            }
        }
        OutputFormat::Json => {
            let mut map = serde_json::Map::new();
            map.insert(name.to_string(), serde_json::to_value(dataset).unwrap_or_default());
            print_json(&map);
        }
    }
}

/// Print every section of a reconciliation report
pub fn print_report(report: &ReconciliationReport, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            for (name, dataset) in report.datasets() {
                print_dataset(name, dataset, format);
                println!();
            }
        }
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = report
                .datasets()
                .iter()
                .map(|(name, dataset)| {
                    let value = serde_json::to_value(dataset).unwrap_or_default();
                    (name.to_string(), value)
                })
                .collect();
            print_json(&map);
        }
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✅".green(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "❌".red(), message.red());
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{}  {}", "⚠️".yellow(), message.yellow());
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankrecon_common::field;

    #[test]
    fn test_render_table_header_and_rows() {
        let dataset = Dataset::from_records(vec![
            vec![field("account_id", "800002"), field("match_status", "Match")],
            vec![field("account_id", "800003"), field("match_status", "Variance")],
        ]);
        let rendered = render_table(&dataset).to_string();
        assert!(rendered.contains("account_id"));
        assert!(rendered.contains("800003"));
        assert!(rendered.contains("Variance"));
    }
}
