//! Column-name normalization onto the canonical schema
//!
//! Producers name columns however they like ("Account ID/Number",
//! `accountId`, `account_id`). A [`ColumnNormalizer`] first applies exact
//! display-name mappings, then keyword rules: a rule matches when every
//! keyword is a substring of the lowercased column name, and the first
//! matching rule wins.

use bankrecon_common::types::{columns, display};
use bankrecon_common::Table;
use tracing::{info, warn};

/// Keyword rule mapping any matching column to `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRule {
    keywords: Vec<String>,
    target: String,
}

impl ColumnRule {
    pub fn new(keywords: &[&str], target: &str) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            target: target.to_string(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn matches(&self, column: &str) -> bool {
        let lower = column.to_lowercase();
        self.keywords.iter().all(|k| lower.contains(k.as_str()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ColumnNormalizer {
    exact: Vec<(String, String)>,
    rules: Vec<ColumnRule>,
}

impl ColumnNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exact(mut self, from: &str, to: &str) -> Self {
        self.exact.push((from.to_string(), to.to_string()));
        self
    }

    pub fn rule(mut self, keywords: &[&str], target: &str) -> Self {
        self.rules.push(ColumnRule::new(keywords, target));
        self
    }

    /// Canonical name for `column`, if any mapping applies
    pub fn target_for(&self, column: &str) -> Option<&str> {
        self.exact
            .iter()
            .find(|(from, _)| from == column)
            .map(|(_, to)| to.as_str())
            .or_else(|| {
                self.rules
                    .iter()
                    .find(|rule| rule.matches(column))
                    .map(ColumnRule::target)
            })
    }

    /// Rename matching columns in place and return the applied renames.
    ///
    /// A rename whose target is already taken by another column is skipped,
    /// so the first column mapped to a name keeps it.
    pub fn normalize(&self, table: &mut Table) -> Vec<(String, String)> {
        let mut applied = Vec::new();
        let original: Vec<String> = table.columns().to_vec();

        for column in original {
            let target = match self.target_for(&column) {
                Some(target) if target != column => target.to_string(),
                _ => continue,
            };
            if table.rename_column(&column, &target) {
                applied.push((column, target));
            } else {
                warn!("Column {:?} left as is: {:?} already present", column, target);
            }
        }

        if !applied.is_empty() {
            info!("Normalized columns: {:?}", applied);
        }
        applied
    }

    /// Account balances captured from the portal
    pub fn web_accounts() -> Self {
        Self::new()
            .exact(display::ACCOUNT_ID, columns::ACCOUNT_ID)
            .exact(display::ACCOUNT_NAME, columns::ACCOUNT_NAME)
            .exact(display::TOTAL_BALANCE, WEB_TOTAL)
            .exact(display::AVAILABLE_BALANCE, WEB_AVAILABLE)
            .rule(&["account", "id"], columns::ACCOUNT_ID)
            .rule(&["account", "number"], columns::ACCOUNT_ID)
            .rule(&["total", "balance"], WEB_TOTAL)
            .rule(&["available", "balance"], WEB_AVAILABLE)
    }

    /// Filtered transactions captured from the portal
    pub fn web_transactions() -> Self {
        Self::new()
            .exact(display::TXN_ID, columns::TRANSACTION_ID)
            .exact(display::TXN_TIME, columns::TRANSACTION_TIME)
            .exact(display::TXN_ACCOUNT_ID, columns::ACCOUNT_ID)
            .exact(display::TXN_ACTION, columns::ACTION)
            .exact(display::TXN_DEBIT, columns::DEBIT)
            .exact(display::TXN_CREDIT, columns::CREDIT)
            .rule(&["account", "id"], columns::ACCOUNT_ID)
            .rule(&["account", "number"], columns::ACCOUNT_ID)
            .rule(&["transaction", "id"], columns::TRANSACTION_ID)
    }

    /// Account details returned by the API
    pub fn api_accounts() -> Self {
        Self::new()
            .rule(&["account", "id"], columns::ACCOUNT_ID)
            .rule(&["account", "name"], columns::ACCOUNT_NAME)
            .rule(&["available", "balance"], columns::AVAILABLE_BALANCE)
            .rule(&["balance"], columns::BALANCE)
    }

    /// Transactions returned by the API
    pub fn api_transactions() -> Self {
        Self::new()
            .rule(&["account", "id"], columns::ACCOUNT_ID)
            .rule(&["transaction", "id"], columns::TRANSACTION_ID)
            .rule(&["debit"], columns::DEBIT)
            .rule(&["credit"], columns::CREDIT)
    }
}

/// Web-side total balance column after normalization
pub const WEB_TOTAL: &str = "total";

/// Web-side available balance column after normalization
pub const WEB_AVAILABLE: &str = "available";

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Account ID/Number", true)]
    #[test_case("account_id", true)]
    #[test_case("accountId", true)]
    #[test_case("Account Name", false)]
    #[test_case("Transaction ID", false)]
    fn test_account_id_rule(column: &str, expected: bool) {
        let rule = ColumnRule::new(&["account", "id"], "account_id");
        assert_eq!(rule.matches(column), expected);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let normalizer = ColumnNormalizer::new()
            .rule(&["balance"], "first")
            .rule(&["total", "balance"], "second");
        assert_eq!(normalizer.target_for("Total Balance"), Some("first"));
        assert_eq!(normalizer.target_for("Name"), None);
    }

    #[test]
    fn test_exact_pass_precedes_fuzzy() {
        let normalizer = ColumnNormalizer::web_transactions();
        // "Transaction Time" carries no id keywords, but the exact map
        // still owns it
        assert_eq!(normalizer.target_for("Transaction Time"), Some("transaction_time"));
        assert_eq!(normalizer.target_for("Account ID"), Some("account_id"));
        assert_eq!(normalizer.target_for("Source Account Number"), Some("account_id"));
        assert_eq!(normalizer.target_for("Memo"), None);
    }

    #[test]
    fn test_normalize_web_account_summary() {
        let mut table = Table::new([
            "Account ID/Number",
            "Account Name/Type",
            "Total Balance",
            "Available Balance",
            "Notes",
        ]);
        let applied = ColumnNormalizer::web_accounts().normalize(&mut table);

        assert_eq!(applied.len(), 4);
        assert_eq!(
            table.columns(),
            &["account_id", "account_name", "total", "available", "Notes"]
        );
    }

    #[test]
    fn test_collision_keeps_first_column() {
        let mut table = Table::new(["Account ID", "Account Number"]);
        ColumnNormalizer::web_accounts().normalize(&mut table);
        assert_eq!(table.columns(), &["account_id", "Account Number"]);
    }

    #[test]
    fn test_camel_case_api_fields() {
        let mut table = Table::new(["accountId", "accountName", "availableBalance", "balance"]);
        ColumnNormalizer::api_accounts().normalize(&mut table);
        assert_eq!(
            table.columns(),
            &["account_id", "account_name", "available_balance", "balance"]
        );
    }

    #[test]
    fn test_empty_table_is_untouched() {
        let mut table = Table::default();
        assert!(ColumnNormalizer::web_accounts().normalize(&mut table).is_empty());
        assert!(table.columns().is_empty());
    }
}
