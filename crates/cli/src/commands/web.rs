//! Portal checks, web capture and the funds transfer (parts 1-4)

use anyhow::{Context, Result};
use bankrecon_common::workbook::{
    ACCOUNT_SUMMARY, FILTERED_TRANSACTIONS, HIGH_VALUE_CREDITS, TRANSFER_DETAILS,
};
use bankrecon_common::{Settings, Workbook};
use bankrecon_e2e::scrape::{high_value_credits, transactions_display_table};
use bankrecon_e2e::{LoginReport, PlaywrightConfig, PlaywrightPortal, TransferReport, WebRunner};

use crate::args::{GlobalArgs, TransferArgs};
use crate::output::{print_dataset, print_json, print_success, print_warning, OutputFormat};

/// Launch a browser-backed runner for the configured portal
pub fn portal_runner(settings: &Settings) -> Result<WebRunner<PlaywrightPortal>> {
    let config = PlaywrightConfig::from_settings(settings)?;
    let portal = PlaywrightPortal::launch(config).context("Failed to start Playwright")?;
    Ok(WebRunner::new(portal, settings.clone()))
}

pub async fn login(global: &GlobalArgs) -> Result<()> {
    let settings = global.settings()?;
    let runner = portal_runner(&settings)?;
    let report = runner.login_check().await?;
    print_login(&report, global.format);
    Ok(())
}

pub fn print_login(report: &LoginReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            print_success(&format!(
                "Login successful on attempt {} ({} ms)",
                report.attempts, report.duration_ms
            ));
            if report.negative_login_rejected {
                print_success("Invalid password was rejected");
            } else {
                print_warning("Invalid password was NOT rejected");
            }
        }
    }
}

pub async fn accounts(global: &GlobalArgs) -> Result<()> {
    let settings = global.settings()?;
    let runner = portal_runner(&settings)?;
    let mut workbook = Workbook::open(&settings.report.output_dir)?;

    let (sweep, summary) = runner.capture_accounts(&mut workbook).await?;
    print_dataset(ACCOUNT_SUMMARY, &sweep.summary_table(), global.format);
    if global.format == OutputFormat::Table {
        print_success(&format!(
            "Wrote {} sheet(s) to {}",
            summary.sheets.len(),
            settings.report.output_dir.display()
        ));
    }
    Ok(())
}

pub async fn transactions(global: &GlobalArgs) -> Result<()> {
    let settings = global.settings()?;
    let runner = portal_runner(&settings)?;
    let mut workbook = Workbook::open(&settings.report.output_dir)?;

    let (job, _) = runner.capture_transactions(&mut workbook).await?;
    let high_value = high_value_credits(&job.rows, settings.report.high_value_threshold);
    print_dataset(FILTERED_TRANSACTIONS, &transactions_display_table(&job.rows), global.format);
    print_dataset(HIGH_VALUE_CREDITS, &transactions_display_table(&high_value), global.format);
    Ok(())
}

pub async fn transfer(global: &GlobalArgs, args: &TransferArgs) -> Result<()> {
    let settings = args.settings(global)?;
    let runner = portal_runner(&settings)?;
    let mut workbook = Workbook::open(&settings.report.output_dir)?;

    let (report, _) = runner.transfer_check(&mut workbook).await?;
    print_transfer(&report, global.format);
    Ok(())
}

pub fn print_transfer(report: &TransferReport, format: OutputFormat) {
    print_dataset(TRANSFER_DETAILS, &report.to_table(), format);
    if format == OutputFormat::Table {
        print_success(&format!(
            "Transferred ${:.2} from {} to {}; both balances verified",
            report.amount, report.source_account, report.destination_account
        ));
    }
}
