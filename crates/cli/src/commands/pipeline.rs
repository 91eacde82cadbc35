//! Full run: portal checks, web capture, then API reconciliation

use std::time::Instant;

use anyhow::Result;
use bankrecon_common::{Settings, Workbook};
use bankrecon_e2e::WebCapture;
use tracing::{error, info};

use super::{config::redacted, validate, web};
use crate::args::GlobalArgs;
use crate::output::{print_error, print_info, print_report, print_success, OutputFormat};

pub async fn execute(global: &GlobalArgs, with_transfer: bool) -> Result<()> {
    let start = Instant::now();
    let settings = global.settings()?;
    info!(settings = ?redacted(&settings), "Starting bankrecon run");
    let mut workbook = Workbook::open(&settings.report.output_dir)?;

    let web = match web_stage(&settings, &mut workbook, global.format, with_transfer).await {
        Ok(capture) => capture,
        Err(e) => {
            error!("Web stage failed: {:#}", e);
            if global.format == OutputFormat::Table {
                print_error(&format!("Web stage failed: {:#}", e));
                print_info("Continuing with API validation only");
            }
            WebCapture::default()
        }
    };

    let report = validate::api_stage(&settings, &web).await;
    validate::write_report(&mut workbook, &report)?;
    print_report(&report, global.format);

    info!("Run finished in {:.1}s", start.elapsed().as_secs_f64());
    if global.format == OutputFormat::Table {
        print_success(&format!(
            "Report written to {}",
            settings.report.output_dir.display()
        ));
    }
    Ok(())
}

/// Parts 1-3 in one browser session. The optional transfer runs before
/// the capture so captured balances match what the API reports afterwards;
/// its failure does not stop the capture.
async fn web_stage(
    settings: &Settings,
    workbook: &mut Workbook,
    format: OutputFormat,
    with_transfer: bool,
) -> Result<WebCapture> {
    let runner = web::portal_runner(settings)?;

    info!("PART 1: Login Check");
    let login = runner.login_check().await?;
    web::print_login(&login, format);

    if with_transfer {
        match runner.transfer_check(workbook).await {
            Ok((report, _)) => web::print_transfer(&report, format),
            Err(e) => {
                error!("Transfer check failed: {}", e);
                if format == OutputFormat::Table {
                    print_error(&format!("Transfer check failed: {}", e));
                }
            }
        }
    }

    Ok(runner.capture(workbook).await?)
}
