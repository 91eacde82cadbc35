//! Funds transfer with before/after balance verification

use async_trait::async_trait;
use bankrecon_common::config::TransferConfig;
use bankrecon_common::{clean_account_name, field, Table};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{error, info};

use crate::error::{E2eError, E2eResult};
use crate::portal::{BankPortal, TransferConfirmation};
use crate::scrape::parse_balance_detail;
use crate::session::RestartableJob;

/// Total balances of the transfer's two accounts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferBalances {
    pub source: Decimal,
    pub destination: Decimal,
}

/// Reads [`TransferBalances`] from the account pages
#[derive(Debug)]
pub struct BalanceRead {
    config: TransferConfig,
    pub balances: TransferBalances,
}

impl BalanceRead {
    pub fn new(config: TransferConfig) -> Self {
        Self {
            config,
            balances: TransferBalances::default(),
        }
    }
}

#[async_trait]
impl<P: BankPortal + ?Sized> RestartableJob<P> for BalanceRead {
    fn name(&self) -> &str {
        "transfer balances"
    }

    fn reset(&mut self) {
        self.balances = TransferBalances::default();
    }

    async fn run(&mut self, portal: &P) -> E2eResult<()> {
        let options = portal.account_options().await?;
        let listed = |id: &str| options.iter().any(|o| o.account_id.trim() == id);
        if !listed(self.config.from_id()) {
            return Err(E2eError::AssertionFailed(format!(
                "Source account '{}' missing from the account list",
                self.config.from_account
            )));
        }
        if !listed(self.config.to_id()) {
            return Err(E2eError::AssertionFailed(format!(
                "Destination account '{}' missing from the account list",
                self.config.to_account
            )));
        }

        let (source, _) = parse_balance_detail(&portal.account_balance(self.config.from_id()).await?);
        let (destination, _) =
            parse_balance_detail(&portal.account_balance(self.config.to_id()).await?);
        self.balances = TransferBalances { source, destination };
        Ok(())
    }
}

/// Submits the configured transfer once
#[derive(Debug)]
pub struct TransferSubmission {
    config: TransferConfig,
    pub confirmation: TransferConfirmation,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl TransferSubmission {
    pub fn new(config: TransferConfig) -> Self {
        Self {
            config,
            confirmation: TransferConfirmation::default(),
            submitted_at: None,
        }
    }
}

#[async_trait]
impl<P: BankPortal + ?Sized> RestartableJob<P> for TransferSubmission {
    fn name(&self) -> &str {
        "funds transfer"
    }

    fn reset(&mut self) {
        self.confirmation = TransferConfirmation::default();
        self.submitted_at = None;
    }

    async fn run(&mut self, portal: &P) -> E2eResult<()> {
        info!(
            "Executing transfer: {} -> {}, Amount: ${:.2}",
            self.config.from_account, self.config.to_account, self.config.amount
        );
        self.confirmation = portal
            .submit_transfer(self.config.from_id(), self.config.to_id(), self.config.amount)
            .await?;
        self.submitted_at = Some(Utc::now());
        Ok(())
    }
}

/// One side of the transfer must have moved by exactly `delta` (cents)
fn verify_leg(role: &str, before: Decimal, after: Decimal, delta: Decimal) -> E2eResult<()> {
    let expected = (before + delta).round_dp(2);
    let actual = after.round_dp(2);
    if expected == actual {
        info!("{} balance verified: ${:.2} -> ${:.2}", role, before, after);
        return Ok(());
    }
    error!("{} balance mismatch: Expected ${:.2}, Got ${:.2}", role, expected, actual);
    Err(E2eError::AssertionFailed(format!(
        "{} balance mismatch after transfer: expected ${:.2}, got ${:.2}",
        role, expected, actual
    )))
}

/// Source down and destination up by `amount`. Both sides are checked and
/// logged; the source mismatch is reported first.
pub fn verify_transfer(
    amount: Decimal,
    before: TransferBalances,
    after: TransferBalances,
) -> E2eResult<()> {
    let source = verify_leg("Source", before.source, after.source, -amount);
    let destination = verify_leg("Destination", before.destination, after.destination, amount);
    source.and(destination)
}

/// A verified transfer as written to the workbook
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReport {
    pub source_account: String,
    pub destination_account: String,
    pub amount: Decimal,
    pub confirmation: TransferConfirmation,
    pub timestamp: DateTime<Utc>,
    pub before: TransferBalances,
    pub after: TransferBalances,
}

impl TransferReport {
    pub fn new(
        config: &TransferConfig,
        confirmation: TransferConfirmation,
        timestamp: DateTime<Utc>,
        before: TransferBalances,
        after: TransferBalances,
    ) -> Self {
        Self {
            source_account: clean_account_name(&config.from_account),
            destination_account: clean_account_name(&config.to_account),
            amount: config.amount,
            confirmation,
            timestamp,
            before,
            after,
        }
    }

    pub fn to_table(&self) -> Table {
        Table::from_records([vec![
            field("Source Account", self.source_account.as_str()),
            field("Destination Account", self.destination_account.as_str()),
            field("Transfer Amount", self.amount),
            field("Confirmation Message", self.confirmation.message.as_str()),
            field(
                "Transaction Timestamp",
                self.timestamp.format("%Y%m%d_%H%M%S").to_string(),
            ),
            field("Source Balance Before", self.before.source),
            field("Source Balance After", self.after.source),
            field("Destination Balance Before", self.before.destination),
            field("Destination Balance After", self.after.destination),
        ]])
    }
}
