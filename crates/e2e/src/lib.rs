//! bankrecon web checks
//!
//! Drives the banking portal through a browser to verify login, capture
//! account balances and transactions for reconciliation, and check that a
//! funds transfer moves both balances by the transferred amount.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    WebRunner<P: BankPortal>                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  login_check()          valid login with retries, then a    │
//! │                         rejected wrong password             │
//! │  capture_accounts()     AccountSweep -> Account_Summary,    │
//! │                         Transactions_<id>                   │
//! │  capture_transactions() FilteredTransactions ->             │
//! │                         Filtered_Transactions,              │
//! │                         High_Value_Credits                  │
//! │  transfer_check()       BalanceRead, TransferSubmission,    │
//! │                         BalanceRead -> Transfer_Details     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SessionRetryPolicy     re-authenticates and restarts a     │
//! │                         RestartableJob on session loss      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PlaywrightPortal       one node script per operation,      │
//! │                         storage state carried between them  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod playwright;
pub mod portal;
pub mod runner;
pub mod scrape;
pub mod session;
pub mod transfer;

pub use error::{E2eError, E2eResult};
pub use playwright::{Browser, PlaywrightConfig, PlaywrightPortal};
pub use portal::{
    login, AccountOption, BankPortal, HistoryKind, HistoryRow, TransferConfirmation,
};
pub use runner::{CaptureSummary, LoginReport, WebCapture, WebRunner};
pub use scrape::{AccountSweep, FilteredTransactions, WebTransaction};
pub use session::{is_session_error, RestartableJob, SessionControl, SessionRetryPolicy};
pub use transfer::{verify_transfer, TransferBalances, TransferReport};
