//! bankrecon Common Library
//!
//! Shared parsing, tabular data, settings and workbook plumbing used by the
//! API client, the web scrapers and the reconciliation engine.

pub mod config;
pub mod error;
pub mod money;
pub mod retry;
pub mod table;
pub mod types;
pub mod workbook;

// Re-export commonly used types
pub use config::Settings;
pub use error::{Error, Result};
pub use money::{clean_account_name, money_or_zero, parse_date, parse_money, parse_timestamp};
pub use retry::{secs_to_duration, Backoff, RecordingSleeper, Sleeper, TokioSleeper};
pub use table::{field, Cell, Field, Record, RowRef, Table};
pub use types::*;
pub use workbook::Workbook;

/// bankrecon version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
