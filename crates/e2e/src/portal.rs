//! Banking portal seam
//!
//! [`BankPortal`] exposes the pages the capture stage reads, returning
//! raw cell text. Interpretation of that text lives in [`crate::scrape`].

use async_trait::async_trait;
use bankrecon_common::{Credentials, DateRange};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::E2eResult;
use crate::session::SessionControl;

/// One entry of the account selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOption {
    pub account_id: String,
    /// Option label as displayed, e.g. `800002 Savings`
    pub account_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Credit,
    Debit,
}

/// A row of an account's credits or debits table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub kind: HistoryKind,
    pub cells: Vec<String>,
}

/// Text the portal shows after a transfer is submitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfirmation {
    pub message: String,
}

impl TransferConfirmation {
    pub fn is_success(&self) -> bool {
        self.message.to_lowercase().contains("successfully")
    }
}

#[async_trait]
pub trait BankPortal: SessionControl {
    fn base_url(&self) -> &str;

    async fn open_login(&self) -> E2eResult<()>;

    /// Fill and submit the login form, waiting for the account menu
    async fn submit_login(&self, credentials: &Credentials) -> E2eResult<()>;

    async fn assert_logged_in(&self) -> E2eResult<()>;

    async fn account_options(&self) -> E2eResult<Vec<AccountOption>>;

    /// `(label, value)` rows of the selected account's balance detail
    async fn account_balance(&self, account_id: &str) -> E2eResult<Vec<(String, String)>>;

    async fn account_history(&self, account_id: &str) -> E2eResult<Vec<HistoryRow>>;

    /// Cell text of every row of the recent-transactions table after
    /// applying the date filter, header excluded
    async fn recent_transactions(&self, range: DateRange) -> E2eResult<Vec<Vec<String>>>;

    /// Fill and submit the transfer form, accounts selected by number
    async fn submit_transfer(
        &self,
        from_id: &str,
        to_id: &str,
        amount: Decimal,
    ) -> E2eResult<TransferConfirmation>;
}

/// Full login sequence: open the form, submit, verify
pub async fn login<P: BankPortal + ?Sized>(portal: &P, credentials: &Credentials) -> E2eResult<()> {
    portal.open_login().await?;
    portal.submit_login(credentials).await?;
    portal.assert_logged_in().await?;
    info!("Login successful");
    Ok(())
}
