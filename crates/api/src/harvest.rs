//! API data retrieval for reconciliation
//!
//! Step A lists accounts, step B fetches each account's details and step C
//! pulls date-filtered transactions. Only authentication failures abort
//! the harvest; anything else degrades to placeholders or skipped rows.

use std::str::FromStr;

use bankrecon_common::{
    clean_account_name, money_or_zero, AccountRecord, DateRange, TransactionRecord,
};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::client::ApiClient;
use crate::endpoints;
use crate::error::ApiResult;
use crate::transport::Transport;

/// Everything retrieved from the API for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiHarvest {
    pub accounts: Vec<AccountRecord>,
    pub transactions: Vec<TransactionRecord>,
}

/// Run steps A, B and C against an authenticated client
pub async fn harvest<T: Transport>(
    client: &mut ApiClient<T>,
    range: DateRange,
) -> ApiResult<ApiHarvest> {
    let accounts = fetch_accounts(client).await?;
    let transactions = fetch_transactions(client, &accounts, range).await?;
    Ok(ApiHarvest {
        accounts,
        transactions,
    })
}

/// Steps A and B: account list, then details per account
pub async fn fetch_accounts<T: Transport>(
    client: &mut ApiClient<T>,
) -> ApiResult<Vec<AccountRecord>> {
    info!("Step A: Retrieving account list from API...");
    let listed = match client.list_accounts().await {
        Ok(listed) => listed,
        Err(e) if e.is_authentication() => {
            error!("Authentication error retrieving accounts: {}", e);
            return Err(e);
        }
        Err(e) => {
            error!("Error retrieving accounts: {}", e);
            return Ok(Vec::new());
        }
    };
    info!(
        "Retrieved {} accounts from {}",
        listed.len(),
        endpoints::SOURCE_ACCOUNT_LIST
    );

    info!("Step B: Retrieving detailed account information...");
    let mut accounts = Vec::with_capacity(listed.len());
    for entry in &listed {
        let account_id = match listed_account_id(entry) {
            Some(id) => id,
            None => {
                warn!("Skipping account entry without an id: {}", entry);
                continue;
            }
        };

        match client.get_account_details(&account_id).await {
            Ok(details) => {
                let record = account_from_details(&account_id, &details);
                info!("Account {}: {}", account_id, text_field(&details, "accountName").unwrap_or_default());
                accounts.push(record);
            }
            Err(e) if e.is_authentication() => {
                error!("Authentication error for account {}", account_id);
                return Err(e);
            }
            Err(e) => {
                warn!("Failed to get details for account {}: {}", account_id, e);
                accounts.push(placeholder_account(&account_id));
            }
        }
    }

    info!("Step B completed: {} accounts with detailed information", accounts.len());
    Ok(accounts)
}

/// Step C: date-filtered transactions for every account
pub async fn fetch_transactions<T: Transport>(
    client: &mut ApiClient<T>,
    accounts: &[AccountRecord],
    range: DateRange,
) -> ApiResult<Vec<TransactionRecord>> {
    info!("Step C: Extracting transaction history (date range: {})...", range);

    let mut transactions = Vec::new();
    for account in accounts {
        let account_id = account.account_id.as_str();
        let entries = match client
            .get_transactions(account_id, Some(range.start), Some(range.end))
            .await
        {
            Ok(entries) => entries,
            Err(e) if e.is_authentication() => {
                error!("Authentication error retrieving transactions for account {}", account_id);
                return Err(e);
            }
            Err(e) => {
                warn!("Failed to retrieve transactions for account {}: {}", account_id, e);
                continue;
            }
        };
        info!("Account {}: {} transactions", account_id, entries.len());

        for entry in &entries {
            match entry {
                Value::Object(txn) => transactions.push(transaction_from_entry(account_id, txn)),
                other => warn!("Skipping unexpected transaction entry: {:.100}", other.to_string()),
            }
        }
    }

    info!(
        "Step C completed: {} total transactions retrieved from API",
        transactions.len()
    );
    Ok(transactions)
}

/// Account id from a list entry: a bare id string or an object with
/// `accountId`, `id` or `account_id`
fn listed_account_id(entry: &Value) -> Option<String> {
    match entry {
        Value::String(id) if !id.trim().is_empty() => Some(id.trim().to_string()),
        Value::Object(map) => ["accountId", "id", "account_id"]
            .iter()
            .find_map(|key| map.get(*key).and_then(scalar_text)),
        _ => None,
    }
}

fn account_from_details(account_id: &str, details: &Value) -> AccountRecord {
    AccountRecord {
        account_id: account_id.to_string(),
        account_name: clean_account_name(&text_field(details, "accountName").unwrap_or_default()),
        account_type: text_field(details, "accountType").unwrap_or_default(),
        balance: money_value(details.get("balance")),
        available_balance: money_value(details.get("availableBalance")),
        source: endpoints::SOURCE_ACCOUNT_DETAILS.to_string(),
    }
}

/// Stand-in for an account whose details could not be fetched
pub fn placeholder_account(account_id: &str) -> AccountRecord {
    AccountRecord {
        account_id: account_id.to_string(),
        account_name: format!("Account {}", account_id),
        account_type: "Unknown".to_string(),
        balance: Decimal::ZERO,
        available_balance: Decimal::ZERO,
        source: format!("{} (basic)", endpoints::SOURCE_ACCOUNT_LIST),
    }
}

fn transaction_from_entry(account_id: &str, txn: &Map<String, Value>) -> TransactionRecord {
    let first_present = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| txn.get(*key))
            .and_then(scalar_text)
            .unwrap_or_default()
    };

    TransactionRecord {
        account_id: account_id.to_string(),
        transaction_id: first_present(&["transactionId", "id"]),
        timestamp: first_present(&["transactionDate", "date"]),
        description: first_present(&["description"]),
        debit: money_value(txn.get("debit")),
        credit: money_value(txn.get("credit")),
        amount: money_value(txn.get("amount")),
        source: endpoints::source_transactions_range(account_id),
    }
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Amount from a currency string or a JSON number; anything else is zero
fn money_value(value: Option<&Value>) -> Decimal {
    match value {
        Some(Value::String(s)) => money_or_zero(s),
        Some(Value::Number(n)) => {
            let raw = n.to_string();
            Decimal::from_str(&raw)
                .or_else(|_| Decimal::from_scientific(&raw))
                .unwrap_or(Decimal::ZERO)
        }
        _ => Decimal::ZERO,
    }
}
