//! Account balance reconciliation

use std::collections::BTreeMap;

use bankrecon_common::types::columns;
use bankrecon_common::{field, Table};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::normalize::{ColumnNormalizer, WEB_AVAILABLE, WEB_TOTAL};
use crate::variance::{variance, MatchStatus};

pub const API_ONLY: &str = "API Only (Web Empty)";
pub const WEB_ONLY: &str = "Web Only (API Empty)";

#[derive(Debug, Clone, Default)]
struct Balances {
    name: Option<String>,
    total: Option<Decimal>,
    available: Option<Decimal>,
}

/// Compare API and web balances per account.
///
/// Never fails: degenerate inputs yield a single-source table tagged with
/// `data_source`, or a one-row diagnostic.
pub fn reconcile_accounts(api: &Table, web: &Table, tolerance: Decimal) -> Table {
    info!("Reconciling account data...");

    let mut api = api.clone();
    ColumnNormalizer::api_accounts().normalize(&mut api);
    let mut web = web.clone();
    ColumnNormalizer::web_accounts().normalize(&mut web);

    match (api.is_empty(), web.is_empty()) {
        (true, true) => {
            warn!("No account data from either source");
            return Table::diagnostic(vec![field(
                "Status",
                "No account data available from API or Web",
            )]);
        }
        (true, false) => {
            warn!("API accounts are empty - returning web data only");
            web.set_column(columns::DATA_SOURCE, WEB_ONLY);
            return web;
        }
        (false, true) => {
            warn!("Web accounts are empty - returning API data only");
            api.set_column(columns::DATA_SOURCE, API_ONLY);
            return api;
        }
        (false, false) => {}
    }

    if !api.has_column(columns::ACCOUNT_ID) {
        error!("API accounts missing 'account_id' column; available: {:?}", api.columns());
        return malformed("API");
    }
    if !web.has_column(columns::ACCOUNT_ID) {
        error!("Web accounts missing 'account_id' column after normalization; available: {:?}", web.columns());
        return malformed("Web");
    }

    let api_side = index_balances(&api, "API", columns::BALANCE, columns::AVAILABLE_BALANCE);
    let web_side = index_balances(&web, "Web", WEB_TOTAL, WEB_AVAILABLE);

    let mut keys: Vec<&String> = api_side.keys().chain(web_side.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut merged = Table::new([
        columns::ACCOUNT_ID,
        columns::ACCOUNT_NAME,
        "balance",
        "available_balance",
        "balance_web",
        "available_balance_web",
        "balance_variance",
        "available_variance",
        columns::MATCH_STATUS,
    ]);

    for key in keys {
        let a = api_side.get(key).cloned().unwrap_or_default();
        let w = web_side.get(key).cloned().unwrap_or_default();

        let balance_variance = variance(a.total, w.total);
        let available_variance = variance(a.available, w.available);
        let status = MatchStatus::classify(balance_variance, tolerance);

        merged.push_record(vec![
            field(columns::ACCOUNT_ID, key.as_str()),
            field(columns::ACCOUNT_NAME, a.name.or(w.name)),
            field("balance", a.total),
            field("available_balance", a.available),
            field("balance_web", w.total),
            field("available_balance_web", w.available),
            field("balance_variance", balance_variance),
            field("available_variance", available_variance),
            field(columns::MATCH_STATUS, status.as_str()),
        ]);
    }

    info!("Reconciled {} accounts", merged.len());
    merged
}

fn malformed(side: &str) -> Table {
    Table::diagnostic(vec![
        field("Status", format!("Error: {} data malformed", side)),
        field("Details", "Missing account_id column"),
    ])
}

/// Balances keyed by string-normalized account id. Rows without an id
/// are dropped; duplicate ids keep the first row.
fn index_balances(
    table: &Table,
    side: &str,
    total_column: &str,
    available_column: &str,
) -> BTreeMap<String, Balances> {
    let mut index = BTreeMap::new();
    for row in table.rows() {
        let key = match row.get(columns::ACCOUNT_ID).as_key() {
            Some(key) => key,
            None => {
                warn!("{} account row without an account id skipped", side);
                continue;
            }
        };
        if index.contains_key(&key) {
            warn!("{} account {} listed more than once; keeping the first", side, key);
            continue;
        }
        let name = row.get(columns::ACCOUNT_NAME);
        index.insert(
            key,
            Balances {
                name: (!name.is_empty()).then(|| name.to_string()),
                total: row.get(total_column).as_decimal(),
                available: row.get(available_column).as_decimal(),
            },
        );
    }
    index
}
