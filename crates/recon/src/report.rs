//! API vs web validation report
//!
//! Four sections, always present: authentication status, variance
//! summary, account reconciliation and transaction reconciliation.
//! Degraded runs fill sections with diagnostic rows instead of dropping
//! them.

use bankrecon_common::types::{columns, display};
use bankrecon_common::{field, DateRange, Table};
use rust_decimal::Decimal;
use tracing::info;

use crate::accounts::reconcile_accounts;
use crate::transactions::reconcile_transactions;
use crate::variance::MatchStatus;

/// Run details echoed into the report
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub username: String,
    pub base_url: String,
    pub range: DateRange,
    pub tolerance: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationReport {
    pub authentication_status: Table,
    pub variance_summary: Table,
    pub account_reconciliation: Table,
    pub transaction_reconciliation: Table,
}

impl ReconciliationReport {
    /// Reconcile API data against whatever web data is available.
    ///
    /// `None` means the web stage never ran; the web metrics are then left
    /// out of the summary.
    pub fn build(
        ctx: &ReportContext,
        api_accounts: &Table,
        api_transactions: &Table,
        web_accounts: Option<&Table>,
        web_transactions: Option<&Table>,
    ) -> Self {
        info!("Performing cross-validation...");

        let authentication_status = Table::diagnostic(vec![
            field("Status", "Success"),
            field("Username", ctx.username.as_str()),
            field("API Base URL", ctx.base_url.as_str()),
            field("Token Obtained", "Yes"),
            field("Date Range", ctx.range.to_string()),
        ]);

        let empty = Table::default();
        let account_reconciliation =
            reconcile_accounts(api_accounts, web_accounts.unwrap_or(&empty), ctx.tolerance);
        let transaction_reconciliation = reconcile_transactions(
            api_transactions,
            web_transactions.unwrap_or(&empty),
            ctx.tolerance,
        );

        let mut summary = SummaryBuilder::default();
        summary.metric(
            "API Accounts Retrieved",
            api_accounts.len(),
            format!("From {}", ACCOUNT_LIST_SOURCE),
        );
        summary.metric(
            "API Transactions Retrieved",
            api_transactions.len(),
            format!("Date range: {}", ctx.range),
        );
        if let Some(web) = web_accounts {
            summary.metric("Web Accounts Scraped", web.len(), "From Part 2");
        }
        if let Some(web) = web_transactions {
            summary.metric("Web Transactions Scraped", web.len(), "From Part 3");
        }
        if let Some((matches, variances)) = status_counts(&account_reconciliation) {
            summary.metric("Account Matches", matches, "Accounts with matching balances");
            summary.metric("Account Variances", variances, "Accounts with balance differences");
        }
        if let Some((matches, variances)) = status_counts(&transaction_reconciliation) {
            summary.metric(
                "Transaction Matches (by account)",
                matches,
                "Accounts with matching transaction totals",
            );
            summary.metric(
                "Transaction Variances (by account)",
                variances,
                "Accounts with transaction differences",
            );
        }

        Self {
            authentication_status,
            variance_summary: summary.finish(),
            account_reconciliation,
            transaction_reconciliation,
        }
    }

    /// Report written when the API could not be used at all
    pub fn api_unavailable(ctx: &ReportContext, reason: &str) -> Self {
        let authentication_status = Table::diagnostic(vec![
            field("Status", "API Unavailable"),
            field("Message", "Could not authenticate with the REST API"),
            field("Attempted Endpoint", format!("{}/api/login", ctx.base_url)),
            field("Username", ctx.username.as_str()),
            field("Note", "Part 6 skipped - API service may be down or credentials invalid"),
            field("Error", reason),
        ]);

        let mut summary = SummaryBuilder::default();
        summary.metric("API Accounts Retrieved", 0usize, "API unavailable");
        summary.metric("API Transactions Retrieved", 0usize, "API unavailable");

        let skipped = || Table::diagnostic(vec![field("Status", "Skipped - API unavailable")]);

        Self {
            authentication_status,
            variance_summary: summary.finish(),
            account_reconciliation: skipped(),
            transaction_reconciliation: skipped(),
        }
    }

    /// Named sections in report order
    pub fn datasets(&self) -> [(&'static str, &Table); 4] {
        [
            ("authentication_status", &self.authentication_status),
            ("variance_summary", &self.variance_summary),
            ("account_reconciliation", &self.account_reconciliation),
            ("transaction_reconciliation", &self.transaction_reconciliation),
        ]
    }
}

const ACCOUNT_LIST_SOURCE: &str = "GET /api/account";

#[derive(Default)]
struct SummaryBuilder {
    table: Table,
}

impl SummaryBuilder {
    fn metric(&mut self, metric: &str, count: usize, details: impl Into<String>) {
        self.table.push_record(vec![
            field("Metric", metric),
            field("Count", count),
            field("Details", details.into()),
        ]);
    }

    fn finish(self) -> Table {
        self.table
    }
}

/// Match and variance counts, when the table carries a status column
fn status_counts(table: &Table) -> Option<(usize, usize)> {
    if !table.has_column(columns::MATCH_STATUS) {
        return None;
    }
    let count = |status: MatchStatus| {
        table
            .rows()
            .filter(|row| row.get(columns::MATCH_STATUS).as_text() == Some(status.as_str()))
            .count()
    };
    Some((count(MatchStatus::Match), count(MatchStatus::Variance)))
}

/// Drop scraped transaction rows without a transaction id. The portal's
/// filtered-transactions sheet carries trailing summary rows that have
/// amounts but no id.
pub fn drop_summary_rows(table: &mut Table) {
    let id_column = if table.has_column(display::TXN_ID) {
        display::TXN_ID
    } else {
        columns::TRANSACTION_ID
    };
    if table.has_column(id_column) {
        table.retain(|row| !row.get(id_column).is_empty());
    }
}
