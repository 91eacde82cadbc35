//! Web capture runner: login check, account sweep, filtered transactions
//! and the verified funds transfer

use std::time::Instant;

use bankrecon_common::workbook::{
    transactions_sheet, ACCOUNT_SUMMARY, FILTERED_TRANSACTIONS, HIGH_VALUE_CREDITS,
    TRANSFER_DETAILS,
};
use bankrecon_common::{Credentials, Settings, Table, Workbook};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::portal::{login, BankPortal};
use crate::scrape::{
    high_value_credits, history_table, transactions_display_table, AccountSweep,
    FilteredTransactions,
};
use crate::session::SessionRetryPolicy;
use crate::transfer::{verify_transfer, BalanceRead, TransferReport, TransferSubmission};

/// Password used for the negative login check
pub const WRONG_PASSWORD: &str = "wrong_password";

/// Result of the login check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginReport {
    /// Attempt on which the valid login went through
    pub attempts: u32,
    /// Whether the portal refused the wrong password
    pub negative_login_rejected: bool,
    pub duration_ms: u64,
}

/// Summary of a web capture stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub stage: String,
    pub sheets: Vec<String>,
    pub rows: usize,
    pub duration_ms: u64,
}

/// Account balances and filtered transactions as written to the workbook
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebCapture {
    pub accounts: Option<Table>,
    pub transactions: Option<Table>,
}

/// Drives the portal through the web capture stages
pub struct WebRunner<P: BankPortal> {
    portal: P,
    credentials: Credentials,
    settings: Settings,
    policy: SessionRetryPolicy,
}

impl<P: BankPortal> WebRunner<P> {
    pub fn new(portal: P, settings: Settings) -> Self {
        let credentials = Credentials::new(&settings.site.user, &settings.site.password);
        let policy = SessionRetryPolicy::new(settings.scrape.max_session_retries);
        Self {
            portal,
            credentials,
            settings,
            policy,
        }
    }

    pub fn with_policy(mut self, policy: SessionRetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn portal(&self) -> &P {
        &self.portal
    }

    /// Part 1: valid login with retries, then a rejected wrong password
    pub async fn login_check(&self) -> E2eResult<LoginReport> {
        let start = Instant::now();
        let max_attempts = self.settings.scrape.max_login_retries.max(1);

        self.portal.open_login().await?;
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = async {
                self.portal.submit_login(&self.credentials).await?;
                self.portal.assert_logged_in().await
            }
            .await;

            match outcome {
                Ok(()) => {
                    info!("Login successful (attempt {})", attempts);
                    break;
                }
                Err(e) if attempts >= max_attempts => {
                    error!("Login attempt {} failed: {}", attempts, e);
                    return Err(E2eError::LoginFailed {
                        attempts,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    warn!("Login attempt {} failed: {}", attempts, e);
                    self.portal.open_login().await?;
                }
            }
        }

        self.portal.open_login().await?;
        let wrong = Credentials::new(&self.credentials.username, WRONG_PASSWORD);
        let negative_login_rejected = match self.portal.submit_login(&wrong).await {
            Ok(()) => {
                warn!("Portal accepted an invalid password");
                false
            }
            Err(e) => {
                info!("Captured negative login state: {}", e);
                true
            }
        };

        Ok(LoginReport {
            attempts,
            negative_login_rejected,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Part 2: every account's balances and history
    pub async fn capture_accounts(
        &self,
        workbook: &mut Workbook,
    ) -> E2eResult<(AccountSweep, CaptureSummary)> {
        let start = Instant::now();
        info!("PART 2: Account Summary & Transaction History Extraction");

        login(&self.portal, &self.credentials).await?;
        let mut sweep = AccountSweep::new();
        self.policy
            .run(&self.portal, &self.credentials, self.portal.base_url(), &mut sweep)
            .await?;
        info!("Extraction complete - {} accounts processed", sweep.accounts.len());

        if sweep.accounts.is_empty() {
            warn!("No account summary data found, writing header only");
        }
        let summary = sweep.summary_table();
        workbook.write_sheet(ACCOUNT_SUMMARY, &summary)?;
        let mut sheets = vec![ACCOUNT_SUMMARY.to_string()];
        let mut rows = summary.len();

        for (account_id, history) in &sweep.history {
            let table = history_table(history);
            if table.is_empty() {
                warn!("No transaction history for account {}", account_id);
                continue;
            }
            let sheet = transactions_sheet(account_id);
            workbook.write_sheet(&sheet, &table)?;
            info!("Saved {} transactions for account {} to sheet: {}", table.len(), account_id, sheet);
            rows += table.len();
            sheets.push(sheet);
        }
        workbook.save()?;

        let summary = CaptureSummary {
            stage: "accounts".to_string(),
            sheets,
            rows,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        Ok((sweep, summary))
    }

    /// Part 3: date-filtered transactions and high-value credits
    pub async fn capture_transactions(
        &self,
        workbook: &mut Workbook,
    ) -> E2eResult<(FilteredTransactions, CaptureSummary)> {
        let start = Instant::now();
        info!("PART 3: Transaction Filtering & High-Value Credits");

        login(&self.portal, &self.credentials).await?;
        let mut job = FilteredTransactions::new(
            self.settings.scrape_range(),
            self.settings.scrape.transaction_time_format.clone(),
        );
        self.policy
            .run(&self.portal, &self.credentials, self.portal.base_url(), &mut job)
            .await?;

        if job.rows.is_empty() {
            warn!("No transactions found in specified date range");
        }
        let filtered = transactions_display_table(&job.rows);
        let high_value = high_value_credits(&job.rows, self.settings.report.high_value_threshold);
        if high_value.is_empty() {
            warn!(
                "No credit transactions >= ${:.2} found",
                self.settings.report.high_value_threshold
            );
        } else {
            info!(
                "High-value credits (>= ${:.2}): {} transactions",
                self.settings.report.high_value_threshold,
                high_value.len()
            );
        }
        let high_value = transactions_display_table(&high_value);

        workbook.write_sheet(FILTERED_TRANSACTIONS, &filtered)?;
        info!("Wrote {} sheet ({} rows)", FILTERED_TRANSACTIONS, filtered.len());
        workbook.write_sheet(HIGH_VALUE_CREDITS, &high_value)?;
        info!("Wrote {} sheet ({} rows)", HIGH_VALUE_CREDITS, high_value.len());
        workbook.save()?;

        let summary = CaptureSummary {
            stage: "transactions".to_string(),
            sheets: vec![FILTERED_TRANSACTIONS.to_string(), HIGH_VALUE_CREDITS.to_string()],
            rows: filtered.len() + high_value.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        Ok((job, summary))
    }

    /// Part 4: transfer between the configured accounts. The sheet is
    /// written only once both balances moved by the transferred amount.
    pub async fn transfer_check(
        &self,
        workbook: &mut Workbook,
    ) -> E2eResult<(TransferReport, CaptureSummary)> {
        let start = Instant::now();
        info!("PART 4: Fund Transfer & Balance Verification");
        let config = &self.settings.transfer;

        login(&self.portal, &self.credentials).await?;
        let mut before = BalanceRead::new(config.clone());
        self.policy
            .run(&self.portal, &self.credentials, self.portal.base_url(), &mut before)
            .await?;
        info!("Captured balances BEFORE transfer");

        let mut submission = TransferSubmission::new(config.clone());
        self.policy
            .run(&self.portal, &self.credentials, self.portal.base_url(), &mut submission)
            .await?;
        if submission.confirmation.is_success() {
            info!("Confirmation: {}", submission.confirmation.message);
        } else {
            warn!(
                "Transfer confirmation not recognised: {:?}",
                submission.confirmation.message
            );
        }

        let mut after = BalanceRead::new(config.clone());
        self.policy
            .run(&self.portal, &self.credentials, self.portal.base_url(), &mut after)
            .await?;
        info!("Captured balances AFTER transfer");

        verify_transfer(config.amount, before.balances, after.balances)?;
        info!("All balance changes verified successfully");

        let report = TransferReport::new(
            config,
            submission.confirmation,
            submission.submitted_at.unwrap_or_else(chrono::Utc::now),
            before.balances,
            after.balances,
        );
        let table = report.to_table();
        workbook.write_sheet(TRANSFER_DETAILS, &table)?;
        workbook.save()?;
        info!("Transfer details written to sheet: {}", TRANSFER_DETAILS);

        let summary = CaptureSummary {
            stage: "transfer".to_string(),
            sheets: vec![TRANSFER_DETAILS.to_string()],
            rows: table.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        Ok((report, summary))
    }

    /// Parts 2 and 3, returning the tables reconciliation consumes
    pub async fn capture(&self, workbook: &mut Workbook) -> E2eResult<WebCapture> {
        let (sweep, _) = self.capture_accounts(workbook).await?;
        let (transactions, _) = self.capture_transactions(workbook).await?;
        Ok(WebCapture {
            accounts: Some(sweep.summary_table()),
            transactions: Some(transactions_display_table(&transactions.rows)),
        })
    }
}
