//! Scrape jobs and the parsing of portal cell text

use async_trait::async_trait;
use bankrecon_common::types::display;
use bankrecon_common::{
    clean_account_name, field, money_or_zero, parse_timestamp, DateRange, Record, Table,
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::error::E2eResult;
use crate::portal::{BankPortal, HistoryKind, HistoryRow};
use crate::session::RestartableJob;

/// Balances of one account as displayed by the portal
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub account_id: String,
    pub account_name: String,
    pub total: Decimal,
    pub available: Decimal,
}

impl AccountSnapshot {
    pub fn to_record(&self) -> Record {
        vec![
            field(display::ACCOUNT_ID, self.account_id.as_str()),
            field(display::ACCOUNT_NAME, self.account_name.as_str()),
            field(display::TOTAL_BALANCE, self.total),
            field(display::AVAILABLE_BALANCE, self.available),
        ]
    }
}

/// `(total, available)` from balance detail rows; absent rows read as zero
pub fn parse_balance_detail(rows: &[(String, String)]) -> (Decimal, Decimal) {
    let mut total = Decimal::ZERO;
    let mut available = Decimal::ZERO;
    for (label, value) in rows {
        if label.contains("Ending balance") {
            total = money_or_zero(value);
        } else if label.contains("Available balance") {
            available = money_or_zero(value);
        }
    }
    (total, available)
}

/// One account's credits and debits as a sheet
pub fn history_table(rows: &[HistoryRow]) -> Table {
    Table::from_records(rows.iter().filter(|row| row.cells.len() >= 4).map(|row| {
        let amount_column = match row.kind {
            HistoryKind::Credit => "Credit Amount",
            HistoryKind::Debit => "Debit Amount",
        };
        vec![
            field("Transaction Date", row.cells[1].trim()),
            field("Transaction Description", row.cells[2].trim()),
            field(amount_column, money_or_zero(&row.cells[3])),
        ]
    }))
}

/// Every account's balances and history.
///
/// Results are keyed by account in selector order.
#[derive(Debug, Default)]
pub struct AccountSweep {
    pub accounts: Vec<AccountSnapshot>,
    pub history: Vec<(String, Vec<HistoryRow>)>,
}

impl AccountSweep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary_table(&self) -> Table {
        let mut table = Table::new(display::ACCOUNT_SUMMARY_COLUMNS);
        for account in &self.accounts {
            table.push_record(account.to_record());
        }
        table
    }
}

#[async_trait]
impl<P: BankPortal + ?Sized> RestartableJob<P> for AccountSweep {
    fn name(&self) -> &str {
        "account sweep"
    }

    fn reset(&mut self) {
        self.accounts.clear();
        self.history.clear();
    }

    async fn run(&mut self, portal: &P) -> E2eResult<()> {
        let options = portal.account_options().await?;
        info!("Found Accounts: {}", options.len());

        for option in options {
            let account_id = option.account_id.trim().to_string();
            if account_id.is_empty() {
                continue;
            }

            let (total, available) = parse_balance_detail(&portal.account_balance(&account_id).await?);
            self.accounts.push(AccountSnapshot {
                account_id: account_id.clone(),
                account_name: clean_account_name(&option.account_name),
                total,
                available,
            });

            let history = portal.account_history(&account_id).await?;
            debug!(account = %account_id, rows = history.len(), "Read transaction history");
            self.history.push((account_id, history));
        }
        Ok(())
    }
}

/// A row of the recent-transactions table
#[derive(Debug, Clone, PartialEq)]
pub struct WebTransaction {
    pub transaction_id: String,
    pub transaction_time: NaiveDateTime,
    pub account_id: String,
    pub action: String,
    pub amount: Decimal,
    pub debit: Decimal,
    pub credit: Decimal,
}

impl WebTransaction {
    pub fn to_record(&self) -> Record {
        vec![
            field(display::TXN_ID, self.transaction_id.as_str()),
            field(display::TXN_TIME, self.transaction_time),
            field(display::TXN_ACCOUNT_ID, self.account_id.as_str()),
            field(display::TXN_ACTION, self.action.as_str()),
            field(display::TXN_DEBIT, self.debit),
            field(display::TXN_CREDIT, self.credit),
        ]
    }
}

/// Parse `[id, time, account, action, amount]` cells.
///
/// Withdrawals and negative amounts are debits, everything else a credit.
/// Rows that are too short or carry an unparseable timestamp yield `None`.
pub fn parse_recent_row(cells: &[String], time_format: &str) -> Option<WebTransaction> {
    if cells.len() < 5 {
        return None;
    }
    let transaction_time = match parse_timestamp(cells[1].trim(), time_format) {
        Ok(ts) => ts,
        Err(e) => {
            debug!("Skipping transaction row: {}", e);
            return None;
        }
    };
    let action = cells[3].trim().to_string();
    let amount = money_or_zero(&cells[4]);
    let (debit, credit) = if action == "Withdrawal" || amount < Decimal::ZERO {
        (amount.abs(), Decimal::ZERO)
    } else {
        (Decimal::ZERO, amount.abs())
    };

    Some(WebTransaction {
        transaction_id: cells[0].trim().to_string(),
        transaction_time,
        account_id: cells[2].trim().to_string(),
        action,
        amount,
        debit,
        credit,
    })
}

/// Display sheet; the header is written even with no rows
pub fn transactions_display_table(rows: &[WebTransaction]) -> Table {
    let mut table = Table::new(display::TRANSACTION_COLUMNS);
    for row in rows {
        table.push_record(row.to_record());
    }
    table
}

/// Credits of at least `threshold`, largest first
pub fn high_value_credits(rows: &[WebTransaction], threshold: Decimal) -> Vec<WebTransaction> {
    let mut selected: Vec<WebTransaction> = rows
        .iter()
        .filter(|row| row.credit >= threshold)
        .cloned()
        .collect();
    selected.sort_by(|a, b| b.credit.cmp(&a.credit));
    selected
}

/// Date-filtered recent transactions across all accounts
#[derive(Debug)]
pub struct FilteredTransactions {
    pub range: DateRange,
    pub time_format: String,
    pub rows: Vec<WebTransaction>,
}

impl FilteredTransactions {
    pub fn new(range: DateRange, time_format: impl Into<String>) -> Self {
        Self {
            range,
            time_format: time_format.into(),
            rows: Vec::new(),
        }
    }
}

#[async_trait]
impl<P: BankPortal + ?Sized> RestartableJob<P> for FilteredTransactions {
    fn name(&self) -> &str {
        "filtered transactions"
    }

    fn reset(&mut self) {
        self.rows.clear();
    }

    async fn run(&mut self, portal: &P) -> E2eResult<()> {
        let raw = portal.recent_transactions(self.range).await?;
        info!("Applied date filter: {}", self.range);

        let total = raw.len();
        self.rows = raw
            .iter()
            .filter_map(|cells| parse_recent_row(cells, &self.time_format))
            .collect();
        if self.rows.len() < total {
            warn!("Skipped {} unparseable transaction row(s)", total - self.rows.len());
        }
        info!("Extracted {} transactions from all accounts", self.rows.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankrecon_common::Cell;
    use rust_decimal_macros::dec;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    const FMT: &str = "%Y-%m-%d %H:%M";

    #[test]
    fn test_balance_detail() {
        let rows = vec![
            ("Balance Detail".to_string(), "Amount".to_string()),
            ("Ending balance as of 3/1/2025".to_string(), "$1,234.56".to_string()),
            ("Available balance".to_string(), "($10.00)".to_string()),
        ];
        assert_eq!(parse_balance_detail(&rows), (dec!(1234.56), dec!(-10.00)));
        assert_eq!(parse_balance_detail(&[]), (Decimal::ZERO, Decimal::ZERO));
    }

    #[test]
    fn test_recent_row_debit_credit_split() {
        let deposit =
            parse_recent_row(&cells(&["101", "2025-03-01 10:00", "800002", "Deposit", "$200.00"]), FMT)
                .unwrap();
        assert_eq!((deposit.debit, deposit.credit), (dec!(0), dec!(200.00)));

        let withdrawal = parse_recent_row(
            &cells(&["102", "2025-03-02 11:30", "800002", "Withdrawal", "-$50.00"]),
            FMT,
        )
        .unwrap();
        assert_eq!((withdrawal.debit, withdrawal.credit), (dec!(50.00), dec!(0)));
        assert_eq!(withdrawal.amount, dec!(-50.00));

        let negative = parse_recent_row(
            &cells(&["103", "2025-03-03 09:15", "800003", "Transfer", "-$5.00"]),
            FMT,
        )
        .unwrap();
        assert_eq!(negative.debit, dec!(5.00));
    }

    #[test]
    fn test_recent_row_rejects_bad_rows() {
        assert!(parse_recent_row(&cells(&["1", "2", "3"]), FMT).is_none());
        assert!(parse_recent_row(
            &cells(&["104", "03/04/2025", "800002", "Deposit", "$1.00"]),
            FMT
        )
        .is_none());
    }

    #[test]
    fn test_high_value_credits_sorted_descending() {
        let rows: Vec<WebTransaction> = [
            ("1", "$150.00"),
            ("2", "$149.99"),
            ("3", "$900.00"),
            ("4", "-$500.00"),
        ]
        .iter()
        .filter_map(|&(id, amount)| {
            parse_recent_row(&cells(&[id, "2025-03-01 10:00", "800002", "Deposit", amount]), FMT)
        })
        .collect();

        let selected = high_value_credits(&rows, dec!(150.00));
        let ids: Vec<&str> = selected.iter().map(|t| t.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1"]);
    }

    #[test]
    fn test_display_tables() {
        let empty = transactions_display_table(&[]);
        assert_eq!(empty.columns(), display::TRANSACTION_COLUMNS);
        assert!(empty.is_empty());

        let row =
            parse_recent_row(&cells(&["101", "2025-03-01 10:00", "800002", "Deposit", "$200.00"]), FMT)
                .unwrap();
        let table = transactions_display_table(&[row]);
        assert_eq!(table.get(0, "Transaction Time").to_string(), "2025-03-01 10:00");
        assert_eq!(table.get(0, "Credit"), &Cell::Number(dec!(200.00)));
    }

    #[test]
    fn test_history_table_columns() {
        let rows = vec![
            HistoryRow {
                kind: HistoryKind::Credit,
                cells: cells(&["", "2025-03-01", "Paycheck", "$1,000.00"]),
            },
            HistoryRow {
                kind: HistoryKind::Debit,
                cells: cells(&["", "2025-03-02", "Rent", "$800.00"]),
            },
            HistoryRow {
                kind: HistoryKind::Debit,
                cells: cells(&["short"]),
            },
        ];
        let table = history_table(&rows);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.columns(),
            &["Transaction Date", "Transaction Description", "Credit Amount", "Debit Amount"]
        );
        assert_eq!(table.get(1, "Debit Amount"), &Cell::Number(dec!(800.00)));
        assert_eq!(table.get(1, "Credit Amount"), &Cell::Empty);
    }
}
