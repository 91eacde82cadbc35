//! Canonical account and transaction records shared by both data sources

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::table::{field, Record, Table};

/// Canonical column names used after normalization
pub mod columns {
    pub const ACCOUNT_ID: &str = "account_id";
    pub const ACCOUNT_NAME: &str = "account_name";
    pub const ACCOUNT_TYPE: &str = "account_type";
    pub const BALANCE: &str = "balance";
    pub const AVAILABLE_BALANCE: &str = "available_balance";
    pub const TRANSACTION_ID: &str = "transaction_id";
    pub const TRANSACTION_DATE: &str = "transaction_date";
    pub const TRANSACTION_TIME: &str = "transaction_time";
    pub const DESCRIPTION: &str = "description";
    pub const ACTION: &str = "action";
    pub const DEBIT: &str = "debit";
    pub const CREDIT: &str = "credit";
    pub const AMOUNT: &str = "amount";
    pub const API_SOURCE: &str = "api_source";
    pub const DATA_SOURCE: &str = "data_source";
    pub const MATCH_STATUS: &str = "match_status";
}

/// Display headers written by the web capture sheets
pub mod display {
    pub const ACCOUNT_ID: &str = "Account ID/Number";
    pub const ACCOUNT_NAME: &str = "Account Name/Type";
    pub const TOTAL_BALANCE: &str = "Total Balance";
    pub const AVAILABLE_BALANCE: &str = "Available Balance";

    pub const ACCOUNT_SUMMARY_COLUMNS: [&str; 4] =
        [ACCOUNT_ID, ACCOUNT_NAME, TOTAL_BALANCE, AVAILABLE_BALANCE];

    pub const TXN_ID: &str = "Transaction ID";
    pub const TXN_TIME: &str = "Transaction Time";
    pub const TXN_ACCOUNT_ID: &str = "Account ID";
    pub const TXN_ACTION: &str = "Action";
    pub const TXN_DEBIT: &str = "Debit";
    pub const TXN_CREDIT: &str = "Credit";

    pub const TRANSACTION_COLUMNS: [&str; 6] =
        [TXN_ID, TXN_TIME, TXN_ACCOUNT_ID, TXN_ACTION, TXN_DEBIT, TXN_CREDIT];
}

/// Login pair for the portal or the API
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Inclusive date window used for filtered transaction queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Account balances as seen by one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub account_id: String,
    pub account_name: String,
    pub account_type: String,
    pub balance: Decimal,
    pub available_balance: Decimal,
    pub source: String,
}

impl AccountRecord {
    pub fn to_record(&self) -> Record {
        vec![
            field(columns::ACCOUNT_ID, self.account_id.as_str()),
            field(columns::ACCOUNT_NAME, self.account_name.as_str()),
            field(columns::ACCOUNT_TYPE, self.account_type.as_str()),
            field(columns::BALANCE, self.balance),
            field(columns::AVAILABLE_BALANCE, self.available_balance),
            field(columns::API_SOURCE, self.source.as_str()),
        ]
    }
}

/// One posted transaction as seen by one source.
///
/// Debit and credit are both non-negative; real transactions populate one
/// of them, but sources are not trusted to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub account_id: String,
    pub transaction_id: String,
    pub timestamp: String,
    pub description: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub amount: Decimal,
    pub source: String,
}

impl TransactionRecord {
    pub fn to_record(&self) -> Record {
        vec![
            field(columns::ACCOUNT_ID, self.account_id.as_str()),
            field(columns::TRANSACTION_ID, self.transaction_id.as_str()),
            field(columns::TRANSACTION_DATE, self.timestamp.as_str()),
            field(columns::DESCRIPTION, self.description.as_str()),
            field(columns::DEBIT, self.debit),
            field(columns::CREDIT, self.credit),
            field(columns::AMOUNT, self.amount),
            field(columns::API_SOURCE, self.source.as_str()),
        ]
    }
}

pub fn accounts_table(records: &[AccountRecord]) -> Table {
    Table::from_records(records.iter().map(AccountRecord::to_record))
}

pub fn transactions_table(records: &[TransactionRecord]) -> Table {
    Table::from_records(records.iter().map(TransactionRecord::to_record))
}
