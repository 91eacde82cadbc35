//! Web capture stages against an in-memory portal

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bankrecon_common::{Cell, Credentials, DateRange, RecordingSleeper, Settings, Workbook};
use bankrecon_e2e::{
    AccountOption, BankPortal, E2eError, E2eResult, HistoryKind, HistoryRow, SessionControl,
    SessionRetryPolicy, TransferConfirmation, WebRunner,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Default)]
struct FakePortal {
    /// Valid submits that fail before one goes through
    login_failures: Mutex<u32>,
    /// Account sweeps that lose the session before one succeeds
    sweep_failures: Mutex<u32>,
    logged_in: Mutex<bool>,
    submits: Mutex<u32>,
    re_auths: Mutex<u32>,
    /// The selector lists no accounts
    no_accounts: bool,
    /// Transfers debit the source but never credit the destination
    lose_credits: bool,
    /// Net movement per account from submitted transfers
    moved: Mutex<BTreeMap<String, Decimal>>,
    transfers: Mutex<u32>,
}

impl FakePortal {
    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn total(&self, account_id: &str) -> Decimal {
        let opening = match account_id {
            "800002" => dec!(1000.00),
            _ => dec!(250.50),
        };
        opening + self.moved.lock().get(account_id).copied().unwrap_or_default()
    }
}

#[async_trait]
impl SessionControl for FakePortal {
    async fn is_logged_out(&self) -> E2eResult<bool> {
        Ok(!*self.logged_in.lock())
    }

    async fn re_authenticate(&self, credentials: &Credentials, _: &str) -> E2eResult<()> {
        *self.re_auths.lock() += 1;
        self.submit_login(credentials).await
    }
}

#[async_trait]
impl BankPortal for FakePortal {
    fn base_url(&self) -> &str {
        "https://bank.test"
    }

    async fn open_login(&self) -> E2eResult<()> {
        *self.logged_in.lock() = false;
        Ok(())
    }

    async fn submit_login(&self, credentials: &Credentials) -> E2eResult<()> {
        *self.submits.lock() += 1;
        if credentials.password != "demo1234" {
            return Err(E2eError::AssertionFailed("Login Failed".into()));
        }
        let mut failures = self.login_failures.lock();
        if *failures > 0 {
            *failures -= 1;
            return Err(E2eError::Timeout("text=MY ACCOUNT".into()));
        }
        *self.logged_in.lock() = true;
        Ok(())
    }

    async fn assert_logged_in(&self) -> E2eResult<()> {
        if *self.logged_in.lock() {
            Ok(())
        } else {
            Err(E2eError::AssertionFailed("MY ACCOUNT not visible".into()))
        }
    }

    async fn account_options(&self) -> E2eResult<Vec<AccountOption>> {
        let mut failures = self.sweep_failures.lock();
        if *failures > 0 {
            *failures -= 1;
            *self.logged_in.lock() = false;
            return Err(E2eError::Playwright("Target closed".into()));
        }
        if self.no_accounts {
            return Ok(Vec::new());
        }
        Ok(vec![
            AccountOption {
                account_id: "800002".into(),
                account_name: "800002 Savings".into(),
            },
            AccountOption {
                account_id: "800003".into(),
                account_name: "800003 Checking".into(),
            },
        ])
    }

    async fn account_balance(&self, account_id: &str) -> E2eResult<Vec<(String, String)>> {
        let total = self.total(account_id);
        let available = match account_id {
            "800002" => total - dec!(50),
            _ => total,
        };
        Ok(vec![
            ("Ending balance as of 3/1/2025".into(), format!("${:.2}", total)),
            ("Available balance".into(), format!("${:.2}", available)),
        ])
    }

    async fn account_history(&self, account_id: &str) -> E2eResult<Vec<HistoryRow>> {
        if account_id != "800002" {
            return Ok(Vec::new());
        }
        Ok(vec![
            HistoryRow {
                kind: HistoryKind::Credit,
                cells: Self::cells(&["", "2025-03-01", "Paycheck", "$1,200.00"]),
            },
            HistoryRow {
                kind: HistoryKind::Debit,
                cells: Self::cells(&["", "2025-03-02", "Rent", "$200.00"]),
            },
        ])
    }

    async fn recent_transactions(&self, _: DateRange) -> E2eResult<Vec<Vec<String>>> {
        Ok(vec![
            Self::cells(&["101", "2025-03-01 10:00", "800002", "Deposit", "$1,200.00"]),
            Self::cells(&["102", "2025-03-02 11:30", "800002", "Withdrawal", "-$200.00"]),
            Self::cells(&["103", "2025-03-03 09:15", "800003", "Deposit", "$150.00"]),
            Self::cells(&["104", "2025-03-04 08:00", "800003", "Deposit", "$20.00"]),
            Self::cells(&["bad row"]),
        ])
    }

    async fn submit_transfer(
        &self,
        from_id: &str,
        to_id: &str,
        amount: Decimal,
    ) -> E2eResult<TransferConfirmation> {
        *self.transfers.lock() += 1;
        let mut moved = self.moved.lock();
        *moved.entry(from_id.to_string()).or_default() -= amount;
        if !self.lose_credits {
            *moved.entry(to_id.to_string()).or_default() += amount;
        }
        Ok(TransferConfirmation {
            message: format!(
                "{:.2} was successfully transferred from Account {} into Account {}",
                amount, from_id, to_id
            ),
        })
    }
}

fn runner(portal: FakePortal) -> (WebRunner<FakePortal>, Arc<RecordingSleeper>) {
    runner_with(portal, Settings::default())
}

fn runner_with(
    portal: FakePortal,
    settings: Settings,
) -> (WebRunner<FakePortal>, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::new());
    let policy = SessionRetryPolicy::new(2).with_sleeper(sleeper.clone());
    (WebRunner::new(portal, settings).with_policy(policy), sleeper)
}

#[tokio::test]
async fn test_login_check_retries_then_rejects_wrong_password() {
    let portal = FakePortal::default();
    *portal.login_failures.lock() = 2;
    let (runner, _) = runner(portal);

    let report = runner.login_check().await.unwrap();
    assert_eq!(report.attempts, 3);
    assert!(report.negative_login_rejected);
    assert_eq!(*runner.portal().submits.lock(), 4);
}

#[tokio::test]
async fn test_login_check_exhaustion() {
    let portal = FakePortal::default();
    *portal.login_failures.lock() = 5;
    let (runner, _) = runner(portal);

    match runner.login_check().await.unwrap_err() {
        E2eError::LoginFailed { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_capture_accounts_recovers_lost_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut workbook = Workbook::open(dir.path()).unwrap();
    let portal = FakePortal::default();
    *portal.sweep_failures.lock() = 1;
    let (runner, sleeper) = runner(portal);

    let (sweep, summary) = runner.capture_accounts(&mut workbook).await.unwrap();
    assert_eq!(sweep.accounts.len(), 2);
    assert_eq!(*runner.portal().re_auths.lock(), 1);
    assert_eq!(sleeper.count(), 1);
    // The empty history of 800003 gets no sheet
    assert_eq!(summary.sheets, vec!["Account_Summary", "Transactions_800002"]);

    let accounts = workbook.read_sheet("Account_Summary").unwrap().unwrap();
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts.get(0, "Account Name/Type").to_string(), "Savings");
    assert_eq!(accounts.get(1, "Total Balance").to_string(), "250.50");

    let history = workbook.read_sheet("Transactions_800002").unwrap().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history.get(1, "Debit Amount").to_string(), "200.00");
    assert!(workbook.read_sheet("Transactions_800003").unwrap().is_none());
}

#[tokio::test]
async fn test_capture_transactions_writes_filtered_and_high_value() {
    let dir = tempfile::tempdir().unwrap();
    let mut workbook = Workbook::open(dir.path()).unwrap();
    let (runner, _) = runner(FakePortal::default());

    let (job, summary) = runner.capture_transactions(&mut workbook).await.unwrap();
    assert_eq!(job.rows.len(), 4);
    assert_eq!(summary.rows, 6);

    let filtered = workbook.read_sheet("Filtered_Transactions").unwrap().unwrap();
    assert_eq!(filtered.len(), 4);
    assert_eq!(filtered.get(1, "Debit").to_string(), "200.00");

    let high_value = workbook.read_sheet("High_Value_Credits").unwrap().unwrap();
    let ids: Vec<String> = high_value
        .rows()
        .map(|row| row.get("Transaction ID").to_string())
        .collect();
    assert_eq!(ids, vec!["101", "103"]);
}

#[tokio::test]
async fn test_capture_returns_reconciliation_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let mut workbook = Workbook::open(dir.path()).unwrap();
    let (runner, _) = runner(FakePortal::default());

    let capture = runner.capture(&mut workbook).await.unwrap();
    assert_eq!(capture.accounts.map(|t| t.len()), Some(2));
    assert_eq!(capture.transactions.map(|t| t.len()), Some(4));
}

#[tokio::test]
async fn test_capture_accounts_writes_header_when_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut workbook = Workbook::open(dir.path()).unwrap();
    let portal = FakePortal {
        no_accounts: true,
        ..FakePortal::default()
    };
    let (runner, _) = runner(portal);

    let (sweep, summary) = runner.capture_accounts(&mut workbook).await.unwrap();
    assert!(sweep.accounts.is_empty());
    assert_eq!(summary.sheets, vec!["Account_Summary"]);
    assert_eq!(summary.rows, 0);

    let accounts = workbook.read_sheet("Account_Summary").unwrap().unwrap();
    assert!(accounts.is_empty());
    assert!(accounts.has_column("Account ID/Number"));
    assert!(accounts.has_column("Total Balance"));
}

#[tokio::test]
async fn test_transfer_check_verifies_balances() {
    let dir = tempfile::tempdir().unwrap();
    let mut workbook = Workbook::open(dir.path()).unwrap();
    let (runner, _) = runner(FakePortal::default());

    let (report, summary) = runner.transfer_check(&mut workbook).await.unwrap();
    assert_eq!(*runner.portal().transfers.lock(), 1);
    assert_eq!(report.before.source, dec!(1000.00));
    assert_eq!(report.after.source, dec!(750.00));
    assert_eq!(report.after.destination, dec!(500.50));
    assert!(report.confirmation.is_success());
    assert_eq!(summary.sheets, vec!["Transfer_Details"]);

    let details = workbook.read_sheet("Transfer_Details").unwrap().unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details.get(0, "Source Account"), &Cell::from("Savings"));
    assert_eq!(details.get(0, "Transfer Amount").to_string(), "250.00");
    assert_eq!(details.get(0, "Source Balance After").to_string(), "750.00");
    assert_eq!(details.get(0, "Destination Balance Before").to_string(), "250.50");
}

#[tokio::test]
async fn test_transfer_mismatch_fails_without_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let mut workbook = Workbook::open(dir.path()).unwrap();
    let portal = FakePortal {
        lose_credits: true,
        ..FakePortal::default()
    };
    let (runner, _) = runner(portal);

    match runner.transfer_check(&mut workbook).await.unwrap_err() {
        E2eError::AssertionFailed(message) => {
            assert_eq!(
                message,
                "Destination balance mismatch after transfer: expected $500.50, got $250.50"
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(workbook.read_sheet("Transfer_Details").unwrap().is_none());
}

#[tokio::test]
async fn test_transfer_from_unlisted_account_is_not_submitted() {
    let dir = tempfile::tempdir().unwrap();
    let mut workbook = Workbook::open(dir.path()).unwrap();
    let mut settings = Settings::default();
    settings.transfer.from_account = "999999 Gold".into();
    let (runner, sleeper) = runner_with(FakePortal::default(), settings);

    let err = runner.transfer_check(&mut workbook).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Assertion failed: Source account '999999 Gold' missing from the account list"
    );
    assert_eq!(*runner.portal().transfers.lock(), 0);
    assert_eq!(sleeper.count(), 0);
}
