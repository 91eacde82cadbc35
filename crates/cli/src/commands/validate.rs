//! API validation and cross-reconciliation (part 6)

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use bankrecon_api::{harvest, ApiClient, Transport};
use bankrecon_common::workbook::{ACCOUNT_SUMMARY, API_DATA_VALIDATION, FILTERED_TRANSACTIONS};
use bankrecon_common::{accounts_table, transactions_table, Credentials, Settings, Workbook};
use bankrecon_e2e::WebCapture;
use bankrecon_recon::{drop_summary_rows, ReconciliationReport, ReportContext};
use tracing::{error, info, warn};

use crate::args::GlobalArgs;
use crate::output::{print_report, print_success, print_warning, OutputFormat};

pub async fn execute(global: &GlobalArgs, web_data: Option<&Path>) -> Result<()> {
    let settings = global.settings()?;
    let web_dir = web_data.unwrap_or(&settings.report.output_dir);
    let web = load_web_sheets(web_dir)?;
    if web.accounts.is_none() && web.transactions.is_none() {
        print_warning(&format!(
            "No web sheets found in {}; reconciling API data only",
            web_dir.display()
        ));
    }

    let report = api_stage(&settings, &web).await;
    let mut workbook = Workbook::open(&settings.report.output_dir)?;
    write_report(&mut workbook, &report)?;

    print_report(&report, global.format);
    if global.format == OutputFormat::Table {
        print_success(&format!(
            "Report written to {}",
            settings.report.output_dir.display()
        ));
    }
    Ok(())
}

/// Web sheets written by an earlier capture, as text tables.
///
/// Sheets that were never written come back as `None`.
pub fn load_web_sheets(dir: &Path) -> Result<WebCapture> {
    let workbook = Workbook::open(dir)?;
    let accounts = workbook.read_sheet(ACCOUNT_SUMMARY)?;
    let mut transactions = workbook.read_sheet(FILTERED_TRANSACTIONS)?;
    if let Some(table) = transactions.as_mut() {
        drop_summary_rows(table);
    }

    match (&accounts, &transactions) {
        (Some(a), Some(t)) => info!(
            "Loaded web data: {} accounts, {} transactions",
            a.len(),
            t.len()
        ),
        (None, _) => warn!("Sheet {} not found in {}", ACCOUNT_SUMMARY, dir.display()),
        (_, None) => warn!("Sheet {} not found in {}", FILTERED_TRANSACTIONS, dir.display()),
    }
    Ok(WebCapture {
        accounts,
        transactions,
    })
}

fn context(settings: &Settings) -> ReportContext {
    ReportContext {
        username: settings.api.user.clone(),
        base_url: settings.api_base_url().to_string(),
        range: settings.api_range(),
        tolerance: settings.report.tolerance,
    }
}

/// Connect over the real transport and reconcile
pub async fn api_stage(settings: &Settings, web: &WebCapture) -> ReconciliationReport {
    let credentials = Credentials::new(&settings.api.user, &settings.api.password);
    let timeout = Duration::from_secs(settings.api.timeout_secs);
    match ApiClient::connect(settings.api_base_url(), credentials, timeout) {
        Ok(mut client) => reconcile_with_api(&mut client, settings, web).await,
        Err(e) => {
            error!("Failed to build API client: {}", e);
            ReconciliationReport::api_unavailable(&context(settings), &e.to_string())
        }
    }
}

/// Authenticate, harvest and reconcile against the web tables.
///
/// Any API failure yields the degraded report instead of an error.
pub async fn reconcile_with_api<T: Transport>(
    client: &mut ApiClient<T>,
    settings: &Settings,
    web: &WebCapture,
) -> ReconciliationReport {
    info!("PART 6: API Testing & Cross-Validation");
    let ctx = context(settings);

    if let Err(e) = client.authenticate().await {
        error!("API authentication failed: {}", e);
        warn!("Skipping Part 6 - API is not available or credentials are invalid");
        client.close();
        return ReconciliationReport::api_unavailable(&ctx, &e.to_string());
    }

    let harvested = harvest(client, settings.api_range()).await;
    client.close();
    let harvested = match harvested {
        Ok(harvested) => harvested,
        Err(e) => {
            error!("API data retrieval failed: {}", e);
            return ReconciliationReport::api_unavailable(&ctx, &e.to_string());
        }
    };
    info!(
        "Retrieved {} accounts and {} transactions from API",
        harvested.accounts.len(),
        harvested.transactions.len()
    );

    ReconciliationReport::build(
        &ctx,
        &accounts_table(&harvested.accounts),
        &transactions_table(&harvested.transactions),
        web.accounts.as_ref(),
        web.transactions.as_ref(),
    )
}

pub fn write_report(workbook: &mut Workbook, report: &ReconciliationReport) -> Result<()> {
    workbook.write_sections(API_DATA_VALIDATION, &report.datasets())?;
    workbook.save()?;
    info!("Wrote {} sheet", API_DATA_VALIDATION);
    Ok(())
}
