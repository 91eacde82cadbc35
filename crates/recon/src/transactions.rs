//! Transaction reconciliation on per-account aggregates

use std::collections::BTreeMap;

use bankrecon_common::types::columns;
use bankrecon_common::{field, Table};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::accounts::{API_ONLY, WEB_ONLY};
use crate::normalize::ColumnNormalizer;
use crate::variance::{variance, MatchStatus};

/// Per-account debit/credit sums and row count
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccountTotals {
    pub debits: Decimal,
    pub credits: Decimal,
    pub count: i64,
}

impl AccountTotals {
    pub fn net(&self) -> Decimal {
        self.credits - self.debits
    }
}

/// Sum debits and credits per account. Blank amounts count as zero; rows
/// without an account id are skipped.
pub fn aggregate_by_account(table: &Table) -> Result<BTreeMap<String, AccountTotals>, String> {
    for required in [columns::ACCOUNT_ID, columns::DEBIT, columns::CREDIT] {
        if !table.has_column(required) {
            return Err(format!("Missing column: {}", required));
        }
    }

    let mut totals: BTreeMap<String, AccountTotals> = BTreeMap::new();
    for row in table.rows() {
        let key = match row.get(columns::ACCOUNT_ID).as_key() {
            Some(key) => key,
            None => {
                warn!("Transaction row without an account id skipped");
                continue;
            }
        };
        let entry = totals.entry(key).or_default();
        entry.debits += row.get(columns::DEBIT).as_decimal().unwrap_or_default();
        entry.credits += row.get(columns::CREDIT).as_decimal().unwrap_or_default();
        entry.count += 1;
    }
    Ok(totals)
}

/// One row per account: totals, count and net amount
pub fn summarize_transactions(table: &Table) -> Table {
    if table.is_empty() {
        return Table::default();
    }

    let required = [
        columns::ACCOUNT_ID,
        columns::DEBIT,
        columns::CREDIT,
        columns::TRANSACTION_ID,
    ];
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|c| !table.has_column(c))
        .collect();
    if !missing.is_empty() {
        warn!(
            "Missing columns for transaction summary: {:?}; available: {:?}",
            missing,
            table.columns()
        );
        return Table::diagnostic(vec![
            field("Status", "Cannot summarize transactions"),
            field("Missing_Columns", missing.join(", ")),
            field("Available_Columns", table.columns().join(", ")),
        ]);
    }

    let totals = match aggregate_by_account(table) {
        Ok(totals) => totals,
        Err(e) => {
            error!("Failed to summarize transactions: {}", e);
            return Table::diagnostic(vec![
                field("Status", "Error summarizing transactions"),
                field("Error", e),
            ]);
        }
    };

    Table::from_records(totals.into_iter().map(|(account_id, t)| {
        vec![
            field(columns::ACCOUNT_ID, account_id),
            field("total_debits", t.debits),
            field("total_credits", t.credits),
            field("transaction_count", t.count),
            field("net_amount", t.net()),
            field(columns::DATA_SOURCE, "Transaction Summary"),
        ]
    }))
}

/// Compare API and web transactions per account after aggregation.
///
/// Never fails: degenerate inputs yield a tagged single-source summary or
/// a one-row diagnostic.
pub fn reconcile_transactions(api: &Table, web: &Table, tolerance: Decimal) -> Table {
    info!("Reconciling transaction data...");

    let mut api = api.clone();
    ColumnNormalizer::api_transactions().normalize(&mut api);
    let mut web = web.clone();
    ColumnNormalizer::web_transactions().normalize(&mut web);

    if api.is_empty() {
        warn!("API transactions are empty - no data to reconcile");
        if web.is_empty() {
            return Table::diagnostic(vec![field(
                "Status",
                "No transaction data available from API or Web",
            )]);
        }
        let mut summary = summarize_transactions(&web);
        summary.set_column(columns::DATA_SOURCE, WEB_ONLY);
        return summary;
    }
    if web.is_empty() {
        warn!("Web transactions are empty - returning API-only data");
        let mut summary = summarize_transactions(&api);
        summary.set_column(columns::DATA_SOURCE, API_ONLY);
        return summary;
    }

    if !api.has_column(columns::ACCOUNT_ID) {
        error!("API transactions missing 'account_id' column; available: {:?}", api.columns());
        return malformed("API");
    }
    if !web.has_column(columns::ACCOUNT_ID) {
        error!("Web transactions missing 'account_id' column after normalization; available: {:?}", web.columns());
        return malformed("Web");
    }

    let api_totals = match aggregate_by_account(&api) {
        Ok(totals) => totals,
        Err(e) => {
            error!("Failed to group API transactions: {}", e);
            return grouping_error("API", e);
        }
    };
    let web_totals = match aggregate_by_account(&web) {
        Ok(totals) => totals,
        Err(e) => {
            error!("Failed to group web transactions: {}", e);
            return grouping_error("web", e);
        }
    };

    let mut keys: Vec<&String> = api_totals.keys().chain(web_totals.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut merged = Table::new([
        columns::ACCOUNT_ID,
        "api_total_debits",
        "api_total_credits",
        "api_txn_count",
        "web_total_debits",
        "web_total_credits",
        "web_txn_count",
        "debit_variance",
        "credit_variance",
        "txn_count_variance",
        "api_net",
        "web_net",
        "net_variance",
        columns::MATCH_STATUS,
    ]);

    for key in keys {
        let a = api_totals.get(key);
        let w = web_totals.get(key);

        let api_net = a.map(AccountTotals::net);
        let web_net = w.map(AccountTotals::net);
        let net_variance = variance(api_net, web_net);
        let count_variance = match (a, w) {
            (Some(a), Some(w)) => Some(a.count - w.count),
            _ => None,
        };

        merged.push_record(vec![
            field(columns::ACCOUNT_ID, key.as_str()),
            field("api_total_debits", a.map(|t| t.debits)),
            field("api_total_credits", a.map(|t| t.credits)),
            field("api_txn_count", a.map(|t| t.count)),
            field("web_total_debits", w.map(|t| t.debits)),
            field("web_total_credits", w.map(|t| t.credits)),
            field("web_txn_count", w.map(|t| t.count)),
            field("debit_variance", variance(a.map(|t| t.debits), w.map(|t| t.debits))),
            field("credit_variance", variance(a.map(|t| t.credits), w.map(|t| t.credits))),
            field("txn_count_variance", count_variance),
            field("api_net", api_net),
            field("web_net", web_net),
            field("net_variance", net_variance),
            field(columns::MATCH_STATUS, MatchStatus::classify(net_variance, tolerance).as_str()),
        ]);
    }

    info!("Reconciled transactions for {} accounts", merged.len());
    merged
}

fn malformed(side: &str) -> Table {
    Table::diagnostic(vec![
        field("Status", format!("Error: {} data malformed", side)),
        field("Details", "Missing account_id column"),
    ])
}

fn grouping_error(side: &str, error: String) -> Table {
    Table::diagnostic(vec![
        field("Status", format!("Error grouping {} transactions", side)),
        field("Error", error),
    ])
}
