//! Playwright browser automation
//!
//! Every portal operation is a generated node script. Scripts share cookies
//! through a storage-state file and resume from the page the previous
//! script ended on, so consecutive calls behave like one browser session.
//! Each script prints a single JSON line: `{ success, result, url, error }`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;

use async_trait::async_trait;
use bankrecon_common::{Credentials, DateRange, Settings};
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::TempDir;
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::portal::{AccountOption, BankPortal, HistoryRow, TransferConfirmation};
use crate::session::SessionControl;

/// Wait for the account menu after submitting the login form
pub const LOGIN_WAIT_TIMEOUT_MS: u64 = 5000;
/// Wait used when asserting a logged-in page
pub const ASSERT_LOGIN_TIMEOUT_MS: u64 = 7000;
/// Quick visibility check of the login form
pub const SESSION_CHECK_TIMEOUT_MS: u64 = 2000;

pub const SELECTOR_USERNAME: &str = "#uid";
pub const SELECTOR_PASSWORD: &str = "#passw";
pub const SELECTOR_LOGIN_SUBMIT: &str = r#"input[name="btnSubmit"]"#;
pub const SELECTOR_LOGIN_FORM: &str = r#"input[name="uid"]"#;
pub const SELECTOR_MY_ACCOUNT: &str = "text=MY ACCOUNT";
pub const SELECTOR_ACCOUNT_DROPDOWN: &str = "#listAccounts";
pub const SELECTOR_GET_ACCOUNT_BUTTON: &str = "#btnGetAccount";
pub const SELECTOR_TRANSACTIONS_TABLE: &str = "#_ctl0__ctl0_Content_Main_MyTransactions";
pub const SELECTOR_TRANSFER_FROM: &str = "#fromAccount";
pub const SELECTOR_TRANSFER_TO: &str = "#toAccount";
pub const SELECTOR_TRANSFER_AMOUNT: &str = "#transferAmount";
pub const SELECTOR_TRANSFER_SUBMIT: &str = r#"input[type="submit"][value="Transfer Money"]"#;
/// Confirmation spans, first non-empty wins
pub const SELECTORS_TRANSFER_RESPONSE: [&str; 2] =
    ["#_ctl0__ctl0_Content_Main_postResp", "#soapResp"];

const LOGIN_PATH: &str = "/login.jsp";
const ACCOUNT_PATH: &str = "/bank/main.jsp";
const RECENT_TRANSACTIONS_PATH: &str = "/bank/transaction.jsp";
const TRANSFER_PATH: &str = "/bank/transfer.jsp";
const STATE_FILE: &str = "storage-state.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Playwright(format!("unsupported browser: {}", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub browser: Browser,
    pub headless: bool,
    /// Failure screenshots land here when set
    pub screenshot_dir: Option<PathBuf>,
    /// `NODE_PATH` for resolving the playwright package
    pub node_path: Option<PathBuf>,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "https://demo.testfire.net".to_string(),
            browser: Browser::Chromium,
            headless: true,
            screenshot_dir: None,
            node_path: None,
        }
    }
}

impl PlaywrightConfig {
    pub fn from_settings(settings: &Settings) -> E2eResult<Self> {
        Ok(Self {
            base_url: settings.site.base_url.trim_end_matches('/').to_string(),
            browser: settings.scrape.browser.parse()?,
            headless: settings.scrape.headless,
            screenshot_dir: Some(settings.scrape.screenshot_dir.clone()),
            node_path: std::env::var_os("NODE_PATH").map(PathBuf::from),
        })
    }
}

/// Output line of a generated script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptOutcome {
    pub success: bool,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Extract the outcome from script stdout; the last JSON line wins
pub fn parse_outcome(stdout: &str) -> Option<ScriptOutcome> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str(line).ok())
}

/// JavaScript string literal for `value`
fn js(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Portal driven by generated Playwright scripts
pub struct PlaywrightPortal {
    config: PlaywrightConfig,
    /// Holds the storage state; removed on drop
    state_dir: TempDir,
    current_url: Mutex<Option<String>>,
}

impl PlaywrightPortal {
    /// Verify Playwright is installed and open a fresh session
    pub fn launch(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;
        if let Some(dir) = &config.screenshot_dir {
            std::fs::create_dir_all(dir)?;
        }
        let state_dir = tempfile::tempdir()?;
        info!(browser = config.browser.as_str(), "Browser session opened");
        Ok(Self {
            config,
            state_dir,
            current_url: Mutex::new(None),
        })
    }

    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir.path().join(STATE_FILE)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Page the next script should start from
    fn resume_url(&self, fallback: &str) -> String {
        self.current_url
            .lock()
            .clone()
            .unwrap_or_else(|| self.url(fallback))
    }

    /// Build the script for one operation. `body` runs on a page opened at
    /// `start_url` and assigns its output to `result`.
    pub fn build_script(&self, operation: &str, start_url: &str, body: &str) -> String {
        let state_path = self.state_path();
        let screenshot = match &self.config.screenshot_dir {
            Some(dir) => js(&screenshot_path(dir, operation).to_string_lossy()),
            None => "null".to_string(),
        };

        format!(
            r#"
const fs = require('fs');
const {{ chromium, firefox, webkit }} = require('playwright');

(async () => {{
  const statePath = {state_path};
  const screenshotPath = {screenshot};
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext(
    fs.existsSync(statePath) ? {{ storageState: statePath }} : {{}}
  );
  const page = await context.newPage();
  const baseUrl = {base_url};
  let result = null;

  try {{
    await page.goto({start_url}, {{ waitUntil: 'domcontentloaded' }});
{body}
    await context.storageState({{ path: statePath }});
    console.log(JSON.stringify({{ success: true, result, url: page.url() }}));
  }} catch (error) {{
    if (screenshotPath) {{
      await page.screenshot({{ path: screenshotPath }}).catch(() => {{}});
    }}
    await context.storageState({{ path: statePath }}).catch(() => {{}});
    console.log(JSON.stringify({{ success: false, error: error.message, url: page.url() }}));
    process.exitCode = 1;
  }} finally {{
    await browser.close();
  }}
}})();
"#,
            state_path = js(&state_path.to_string_lossy()),
            screenshot = screenshot,
            browser = self.config.browser.as_str(),
            headless = self.config.headless,
            base_url = js(&self.config.base_url),
            start_url = js(start_url),
            body = body,
        )
    }

    /// Run one operation's script and decode its result
    async fn run<T: DeserializeOwned>(&self, operation: &str, start_url: &str, body: &str) -> E2eResult<T> {
        let script = self.build_script(operation, start_url, body);
        let outcome = self.run_script(operation, &script).await?;

        if let Some(url) = &outcome.url {
            *self.current_url.lock() = Some(url.clone());
        }
        if !outcome.success {
            return Err(E2eError::StepFailed {
                step: operation.to_string(),
                reason: outcome.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(serde_json::from_value(outcome.result)?)
    }

    /// Execute a script via node
    pub async fn run_script(&self, operation: &str, script: &str) -> E2eResult<ScriptOutcome> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join(format!("{}.js", operation));
        std::fs::write(&script_path, script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let mut command = TokioCommand::new("node");
        command.arg(&script_path);
        if let Some(node_path) = &self.config.node_path {
            command.env("NODE_PATH", node_path);
        }
        let output = command.output().await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_outcome(&stdout) {
            Some(outcome) => Ok(outcome),
            None => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(E2eError::Playwright(format!(
                    "Script {} produced no result:\nstdout: {}\nstderr: {}",
                    operation, stdout, stderr
                )))
            }
        }
    }

    fn login_body(credentials: &Credentials) -> String {
        format!(
            r#"    await page.fill({user_sel}, {user});
    await page.fill({pass_sel}, {pass});
    await page.click({submit});
    await page.waitForSelector({my_account}, {{ timeout: {timeout} }});"#,
            user_sel = js(SELECTOR_USERNAME),
            user = js(&credentials.username),
            pass_sel = js(SELECTOR_PASSWORD),
            pass = js(&credentials.password),
            submit = js(SELECTOR_LOGIN_SUBMIT),
            my_account = js(SELECTOR_MY_ACCOUNT),
            timeout = LOGIN_WAIT_TIMEOUT_MS,
        )
    }

    fn assert_logged_in_body() -> String {
        format!(
            r#"    await page.locator({my_account}).waitFor({{ state: 'visible', timeout: {timeout} }});"#,
            my_account = js(SELECTOR_MY_ACCOUNT),
            timeout = ASSERT_LOGIN_TIMEOUT_MS,
        )
    }

    fn select_account_body(account_id: &str) -> String {
        format!(
            r#"    await page.selectOption({dropdown}, {account});
    await page.click({button});
    await page.waitForLoadState();"#,
            dropdown = js(SELECTOR_ACCOUNT_DROPDOWN),
            account = js(account_id),
            button = js(SELECTOR_GET_ACCOUNT_BUTTON),
        )
    }

    fn transfer_body(from_id: &str, to_id: &str, amount: Decimal) -> String {
        let responses = SELECTORS_TRANSFER_RESPONSE
            .iter()
            .map(|selector| js(selector))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            r#"    await page.selectOption({from_sel}, {from});
    await page.selectOption({to_sel}, {to});
    await page.fill({amount_sel}, {amount});
    await page.click({submit});
    await page.waitForLoadState();
    let message = '';
    for (const selector of [{responses}]) {{
      const span = page.locator(selector);
      if (!message && await span.count()) {{
        message = (await span.first().innerText()).trim();
      }}
    }}
    if (!message) {{
      const fallback = page.getByText('successfully transferred');
      if (await fallback.count()) {{
        message = (await fallback.first().innerText()).trim();
      }}
    }}
    result = {{ message }};"#,
            from_sel = js(SELECTOR_TRANSFER_FROM),
            from = js(from_id),
            to_sel = js(SELECTOR_TRANSFER_TO),
            to = js(to_id),
            amount_sel = js(SELECTOR_TRANSFER_AMOUNT),
            amount = js(&format!("{:.2}", amount)),
            submit = js(SELECTOR_TRANSFER_SUBMIT),
            responses = responses,
        )
    }
}

impl Drop for PlaywrightPortal {
    fn drop(&mut self) {
        debug!("Browser session closed");
    }
}

#[async_trait]
impl SessionControl for PlaywrightPortal {
    async fn is_logged_out(&self) -> E2eResult<bool> {
        let body = format!(
            r#"    const formVisible = await page.locator({form}).isVisible({{ timeout: {timeout} }});
    const url = page.url();
    result = formVisible || url.includes('/login.jsp') || url.endsWith('/');"#,
            form = js(SELECTOR_LOGIN_FORM),
            timeout = SESSION_CHECK_TIMEOUT_MS,
        );
        let start = self.resume_url(ACCOUNT_PATH);
        match self.run::<bool>("session_check", &start, &body).await {
            Ok(logged_out) => Ok(logged_out),
            Err(e) => {
                warn!("Session state unknown, assuming logged out: {}", e);
                Ok(true)
            }
        }
    }

    async fn re_authenticate(&self, credentials: &Credentials, base_url: &str) -> E2eResult<()> {
        let body = format!(
            "{}\n{}",
            Self::login_body(credentials),
            Self::assert_logged_in_body()
        );
        let start = format!("{}{}", base_url.trim_end_matches('/'), LOGIN_PATH);
        self.run::<Value>("re_authenticate", &start, &body).await?;
        Ok(())
    }
}

#[async_trait]
impl BankPortal for PlaywrightPortal {
    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn open_login(&self) -> E2eResult<()> {
        self.run::<Value>("open_login", &self.url(LOGIN_PATH), "").await?;
        Ok(())
    }

    async fn submit_login(&self, credentials: &Credentials) -> E2eResult<()> {
        let start = self.resume_url(LOGIN_PATH);
        self.run::<Value>("login", &start, &Self::login_body(credentials))
            .await?;
        Ok(())
    }

    async fn assert_logged_in(&self) -> E2eResult<()> {
        let start = self.resume_url(ACCOUNT_PATH);
        self.run::<Value>("assert_logged_in", &start, &Self::assert_logged_in_body())
            .await
            .map_err(|e| E2eError::AssertionFailed(e.to_string()))?;
        Ok(())
    }

    async fn account_options(&self) -> E2eResult<Vec<AccountOption>> {
        let body = format!(
            r#"    result = await page.$$eval({dropdown} + ' option', options => options.map(o => ({{
      account_id: (o.getAttribute('value') || '').trim(),
      account_name: o.innerText.trim(),
    }})));"#,
            dropdown = js(SELECTOR_ACCOUNT_DROPDOWN),
        );
        self.run("account_options", &self.url(ACCOUNT_PATH), &body).await
    }

    async fn account_balance(&self, account_id: &str) -> E2eResult<Vec<(String, String)>> {
        let body = format!(
            r#"{select}
    result = await page.evaluate(() => {{
      const table = Array.from(document.querySelectorAll('table')).find(t =>
        Array.from(t.querySelectorAll('th')).some(th => th.innerText.includes('Balance Detail')));
      if (!table) return [];
      return Array.from(table.querySelectorAll('tr'))
        .map(tr => Array.from(tr.querySelectorAll('td')).map(td => td.innerText.trim()))
        .filter(cells => cells.length >= 2)
        .map(cells => [cells[0], cells[1]]);
    }});"#,
            select = Self::select_account_body(account_id),
        );
        self.run("account_balance", &self.url(ACCOUNT_PATH), &body).await
    }

    async fn account_history(&self, account_id: &str) -> E2eResult<Vec<HistoryRow>> {
        let body = format!(
            r#"{select}
    result = await page.evaluate(() => {{
      const rows = [];
      for (const kind of ['credit', 'debit']) {{
        const table = document.querySelector(`div#${{kind}}s table`);
        if (!table) continue;
        for (const tr of table.querySelectorAll('tr')) {{
          const cells = Array.from(tr.querySelectorAll('td')).map(td => td.innerText.trim());
          if (cells.length >= 4) rows.push({{ kind, cells }});
        }}
      }}
      return rows;
    }});"#,
            select = Self::select_account_body(account_id),
        );
        self.run("account_history", &self.url(ACCOUNT_PATH), &body).await
    }

    async fn recent_transactions(&self, range: DateRange) -> E2eResult<Vec<Vec<String>>> {
        let body = format!(
            r#"    const start = page.locator('input[name="startDate"]');
    const end = page.locator('input[name="endDate"]');
    if (await start.count() && await end.count()) {{
      await start.fill({from});
      await end.fill({to});
      await page.click('input[type="submit"][value="Submit"]');
      await page.waitForLoadState();
    }}
    result = await page.$$eval({table} + ' tr', rows => rows.slice(1).map(tr =>
      Array.from(tr.querySelectorAll('td')).map(td => td.innerText.trim())));"#,
            from = js(&range.start.format("%Y-%m-%d").to_string()),
            to = js(&range.end.format("%Y-%m-%d").to_string()),
            table = js(SELECTOR_TRANSACTIONS_TABLE),
        );
        self.run(
            "recent_transactions",
            &self.url(RECENT_TRANSACTIONS_PATH),
            &body,
        )
        .await
    }

    async fn submit_transfer(
        &self,
        from_id: &str,
        to_id: &str,
        amount: Decimal,
    ) -> E2eResult<TransferConfirmation> {
        let body = Self::transfer_body(from_id, to_id, amount);
        self.run("transfer", &self.url(TRANSFER_PATH), &body).await
    }
}

/// Where `PlaywrightPortal` keeps a failure screenshot for `operation`
pub fn screenshot_path(dir: &Path, operation: &str) -> PathBuf {
    dir.join(format!("{}_{}.png", operation, Utc::now().format("%Y%m%d_%H%M%S")))
}
