//! REST endpoint paths and source tags

/// `POST {username, password}` → `{"Authorization": "Bearer <token>"}`
pub const LOGIN: &str = "/api/login";

/// `GET` → `{"Accounts": [...]}`
pub const ACCOUNTS: &str = "/api/account";

pub fn account(account_id: &str) -> String {
    format!("{}/{}", ACCOUNTS, account_id)
}

/// `GET` for recent activity, `POST {startDate, endDate}` for a range
pub fn transactions(account_id: &str) -> String {
    format!("{}/{}/transactions", ACCOUNTS, account_id)
}

/// Source tags recorded on harvested rows
pub const SOURCE_ACCOUNT_LIST: &str = "GET /api/account";
pub const SOURCE_ACCOUNT_DETAILS: &str = "GET /api/account/{accountNo}";

pub fn source_transactions_range(account_id: &str) -> String {
    format!("POST /api/account/{}/transactions", account_id)
}

/// Response keys that may hold a transaction list, in lookup order
pub const TRANSACTION_KEYS: [&str; 3] = ["transactions", "lastTenTransactions", "Transactions"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(account("800002"), "/api/account/800002");
        assert_eq!(transactions("800002"), "/api/account/800002/transactions");
        assert_eq!(
            source_transactions_range("800002"),
            "POST /api/account/800002/transactions"
        );
    }
}
