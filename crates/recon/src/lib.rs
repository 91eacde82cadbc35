//! bankrecon reconciliation engine
//!
//! Normalizes API and web datasets onto one schema, joins them by account
//! and classifies every variance against a tolerance. Nothing here fails:
//! degenerate inputs come back as diagnostic rows.

pub mod accounts;
pub mod normalize;
pub mod report;
pub mod transactions;
pub mod variance;

pub use accounts::{reconcile_accounts, API_ONLY, WEB_ONLY};
pub use normalize::{ColumnNormalizer, ColumnRule};
pub use report::{drop_summary_rows, ReconciliationReport, ReportContext};
pub use transactions::{reconcile_transactions, summarize_transactions};
pub use variance::{variance, MatchStatus, DEFAULT_TOLERANCE};
