//! Global arguments and effective settings

use std::path::PathBuf;

use anyhow::{Context, Result};
use bankrecon_common::Settings;
use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use tracing::debug;

use crate::output::OutputFormat;

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Settings file (TOML); missing file means defaults
    #[arg(long, env = "BANKRECON_CONFIG", default_value = "bankrecon.toml", global = true)]
    pub config: PathBuf,

    /// Workbook directory
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Portal base URL (also the API base)
    #[arg(long, env = "BANKRECON_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Portal username
    #[arg(long, env = "BANKRECON_USER", global = true)]
    pub user: Option<String>,

    /// Portal password
    #[arg(long, env = "BANKRECON_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// API username
    #[arg(long, env = "BANKRECON_API_USER", global = true)]
    pub api_user: Option<String>,

    /// API password
    #[arg(long, env = "BANKRECON_API_PASSWORD", hide_env_values = true, global = true)]
    pub api_password: Option<String>,

    /// First day of the transaction window (YYYY-MM-DD), web and API
    #[arg(long, global = true)]
    pub start: Option<NaiveDate>,

    /// Last day of the transaction window (YYYY-MM-DD), web and API
    #[arg(long, global = true)]
    pub end: Option<NaiveDate>,

    /// Reconciliation tolerance in currency units
    #[arg(long, global = true)]
    pub tolerance: Option<Decimal>,

    /// Credit amount for the high-value sheet
    #[arg(long, global = true)]
    pub high_value_threshold: Option<Decimal>,

    /// Browser engine: chromium, firefox or webkit
    #[arg(long, global = true)]
    pub browser: Option<String>,

    /// Show the browser window
    #[arg(long, global = true)]
    pub headed: bool,
}

impl GlobalArgs {
    /// Settings file with command-line and environment overrides applied
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load(&self.config)
            .with_context(|| format!("Failed to load settings from {}", self.config.display()))?;
        self.apply(&mut settings);
        settings.validate().context("Invalid settings")?;
        debug!(config = %self.config.display(), "Resolved settings");
        Ok(settings)
    }

    fn apply(&self, settings: &mut Settings) {
        if let Some(output) = &self.output {
            settings.report.output_dir = output.clone();
        }
        if let Some(base_url) = &self.base_url {
            settings.site.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(user) = &self.user {
            settings.site.user = user.clone();
        }
        if let Some(password) = &self.password {
            settings.site.password = password.clone();
        }
        if let Some(user) = &self.api_user {
            settings.api.user = user.clone();
        }
        if let Some(password) = &self.api_password {
            settings.api.password = password.clone();
        }
        if let Some(start) = self.start {
            settings.api.filter_start = start;
            settings.scrape.filter_start = start;
        }
        if let Some(end) = self.end {
            settings.api.filter_end = end;
            settings.scrape.filter_end = end;
        }
        if let Some(tolerance) = self.tolerance {
            settings.report.tolerance = tolerance;
        }
        if let Some(threshold) = self.high_value_threshold {
            settings.report.high_value_threshold = threshold;
        }
        if let Some(browser) = &self.browser {
            settings.scrape.browser = browser.clone();
        }
        if self.headed {
            settings.scrape.headless = false;
        }
    }
}

/// Overrides for the funds transfer
#[derive(Debug, Clone, Default, Args)]
pub struct TransferArgs {
    /// Source account label, e.g. "800002 Savings"
    #[arg(long)]
    pub from: Option<String>,

    /// Destination account label
    #[arg(long)]
    pub to: Option<String>,

    /// Amount to move
    #[arg(long)]
    pub amount: Option<Decimal>,
}

impl TransferArgs {
    /// `global` settings with the transfer overrides applied
    pub fn settings(&self, global: &GlobalArgs) -> Result<Settings> {
        let mut settings = global.settings()?;
        if let Some(from) = &self.from {
            settings.transfer.from_account = from.trim().to_string();
        }
        if let Some(to) = &self.to {
            settings.transfer.to_account = to.trim().to_string();
        }
        if let Some(amount) = self.amount {
            settings.transfer.amount = amount;
        }
        settings.validate().context("Invalid transfer settings")?;
        Ok(settings)
    }
}
