//! bankrecon CLI
//!
//! Command-line interface sequencing the portal checks, the web capture
//! and the API reconciliation.

pub mod args;
pub mod commands;
pub mod output;
