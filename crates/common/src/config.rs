//! Run configuration

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::DateRange;

/// Settings for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Banking portal under test
    pub site: SiteConfig,

    /// REST API access
    pub api: ApiConfig,

    /// Browser scraping
    pub scrape: ScrapeConfig,

    /// Workbook output and reconciliation thresholds
    pub report: ReportConfig,

    /// Funds transfer check
    pub transfer: TransferConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            api: ApiConfig::default(),
            scrape: ScrapeConfig::default(),
            report: ReportConfig::default(),
            transfer: TransferConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Portal root, also the API base
    pub base_url: String,

    /// Portal login
    pub user: String,
    pub password: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://demo.testfire.net".to_string(),
            user: "jsmith".to_string(),
            password: "demo1234".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Overrides `site.base_url` for API calls
    pub base_url: Option<String>,

    pub user: String,
    pub password: String,

    /// Per-request transport timeout
    pub timeout_secs: u64,

    /// Transaction window for the range query
    pub filter_start: NaiveDate,
    pub filter_end: NaiveDate,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            user: "jsmith".to_string(),
            password: "demo1234".to_string(),
            timeout_secs: 20,
            filter_start: default_filter_start(),
            filter_end: default_filter_end(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub filter_start: NaiveDate,
    pub filter_end: NaiveDate,

    /// chrono format of the portal's transaction timestamps
    pub transaction_time_format: String,

    /// Total attempts for a session-guarded scrape
    pub max_session_retries: u32,

    /// Login attempts before part 1 gives up
    pub max_login_retries: u32,

    /// Failure screenshots
    pub screenshot_dir: PathBuf,

    /// Playwright browser engine
    pub browser: String,

    pub headless: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            filter_start: default_filter_start(),
            filter_end: default_filter_end(),
            transaction_time_format: "%Y-%m-%d %H:%M".to_string(),
            max_session_retries: 2,
            max_login_retries: 3,
            screenshot_dir: PathBuf::from("artifacts/screenshots"),
            browser: "chromium".to_string(),
            headless: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Workbook directory
    pub output_dir: PathBuf,

    /// Largest absolute variance still reported as a match
    pub tolerance: Decimal,

    /// Minimum credit listed on the high-value sheet
    pub high_value_threshold: Decimal,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("artifacts/outputs"),
            tolerance: Decimal::new(1, 2),
            high_value_threshold: Decimal::new(150, 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Selector labels, e.g. `800002 Savings`; the leading token is the
    /// account number
    pub from_account: String,
    pub to_account: String,

    pub amount: Decimal,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            from_account: "800002 Savings".to_string(),
            to_account: "800003 Checking".to_string(),
            amount: Decimal::new(25000, 2),
        }
    }
}

impl TransferConfig {
    pub fn from_id(&self) -> &str {
        account_number(&self.from_account)
    }

    pub fn to_id(&self) -> &str {
        account_number(&self.to_account)
    }
}

fn account_number(label: &str) -> &str {
    label.split_whitespace().next().unwrap_or_default()
}

fn default_filter_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 2, 1).unwrap_or_default()
}

fn default_filter_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 15).unwrap_or_default()
}

impl Settings {
    /// Load settings from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let settings: Self = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Self::default())
        }
    }

    /// Save settings as pretty TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.filter_start > self.api.filter_end {
            return Err(Error::InvalidConfig(format!(
                "api filter_start {} is after filter_end {}",
                self.api.filter_start, self.api.filter_end
            )));
        }
        if self.scrape.filter_start > self.scrape.filter_end {
            return Err(Error::InvalidConfig(format!(
                "scrape filter_start {} is after filter_end {}",
                self.scrape.filter_start, self.scrape.filter_end
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(Error::InvalidConfig("api timeout_secs must be positive".into()));
        }
        if self.scrape.max_session_retries == 0 {
            return Err(Error::InvalidConfig(
                "scrape max_session_retries must be at least 1".into(),
            ));
        }
        if self.scrape.max_login_retries == 0 {
            return Err(Error::InvalidConfig(
                "scrape max_login_retries must be at least 1".into(),
            ));
        }
        if self.report.tolerance.is_sign_negative() {
            return Err(Error::InvalidConfig("report tolerance must not be negative".into()));
        }
        if self.transfer.amount <= Decimal::ZERO {
            return Err(Error::InvalidConfig("transfer amount must be positive".into()));
        }
        if self.transfer.from_id().is_empty() || self.transfer.to_id().is_empty() {
            return Err(Error::InvalidConfig("transfer accounts must not be blank".into()));
        }
        if self.transfer.from_id() == self.transfer.to_id() {
            return Err(Error::InvalidConfig(format!(
                "transfer source and destination are both {}",
                self.transfer.from_id()
            )));
        }
        Ok(())
    }

    /// Base URL used for API calls
    pub fn api_base_url(&self) -> &str {
        self.api.base_url.as_deref().unwrap_or(&self.site.base_url)
    }

    pub fn api_range(&self) -> DateRange {
        DateRange::new(self.api.filter_start, self.api.filter_end)
    }

    pub fn scrape_range(&self) -> DateRange {
        DateRange::new(self.scrape.filter_start, self.scrape.filter_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.site.base_url, "https://demo.testfire.net");
        assert_eq!(settings.api_base_url(), "https://demo.testfire.net");
        assert_eq!(settings.report.tolerance, dec!(0.01));
        assert_eq!(settings.report.high_value_threshold, dec!(150));
        assert_eq!(settings.scrape.max_session_retries, 2);
        assert_eq!(settings.api_range().to_string(), "2025-02-01 to 2025-04-15");
        settings.validate().unwrap();
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_and_load_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/bankrecon.toml");

        let mut settings = Settings::default();
        settings.api.base_url = Some("http://localhost:8080".into());
        settings.report.tolerance = dec!(0.5);
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);

        std::fs::write(&path, "[site]\nuser = \"admin\"\n").unwrap();
        let partial = Settings::load(&path).unwrap();
        assert_eq!(partial.site.user, "admin");
        assert_eq!(partial.site.password, "demo1234");
        assert_eq!(partial.api.timeout_secs, 20);
    }

    #[test]
    fn test_rejects_inverted_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(
            &path,
            "[api]\nfilter_start = \"2025-05-01\"\nfilter_end = \"2025-04-01\"\n",
        )
        .unwrap();
        assert!(matches!(Settings::load(&path), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_transfer_section() {
        let settings = Settings::default();
        assert_eq!(settings.transfer.from_id(), "800002");
        assert_eq!(settings.transfer.to_id(), "800003");
        assert_eq!(settings.transfer.amount, dec!(250.00));

        let mut same = settings.clone();
        same.transfer.to_account = "800002 Checking".into();
        assert!(matches!(same.validate(), Err(Error::InvalidConfig(_))));

        let mut free = settings;
        free.transfer.amount = dec!(0);
        assert!(matches!(free.validate(), Err(Error::InvalidConfig(_))));
    }
}
