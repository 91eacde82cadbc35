//! Reconciliation against web sheets reloaded from a workbook

use bankrecon_common::types::display;
use bankrecon_common::workbook::{ACCOUNT_SUMMARY, FILTERED_TRANSACTIONS};
use bankrecon_common::{
    accounts_table, field, transactions_table, AccountRecord, Cell, DateRange, Table,
    TransactionRecord, Workbook,
};
use bankrecon_recon::{drop_summary_rows, ReconciliationReport, ReportContext};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn api_account(id: &str, balance: Decimal) -> AccountRecord {
    AccountRecord {
        account_id: id.to_string(),
        account_name: "Savings".to_string(),
        account_type: "Savings".to_string(),
        balance,
        available_balance: balance,
        source: "GET /api/account/{accountNo}".to_string(),
    }
}

fn api_txn(account: &str, id: &str, debit: Decimal, credit: Decimal) -> TransactionRecord {
    TransactionRecord {
        account_id: account.to_string(),
        transaction_id: id.to_string(),
        timestamp: "2025-03-01".to_string(),
        description: "Deposit".to_string(),
        debit,
        credit,
        amount: credit - debit,
        source: format!("POST /api/account/{}/transactions", account),
    }
}

fn context() -> ReportContext {
    ReportContext {
        username: "jsmith".to_string(),
        base_url: "https://demo.testfire.net".to_string(),
        range: DateRange::new(
            NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 15).unwrap(),
        ),
        tolerance: dec!(0.01),
    }
}

/// Write the web sheets the way the capture stage does, then read them
/// back as text the way `validate` does
fn reloaded_web_sheets(dir: &std::path::Path) -> (Table, Table) {
    let mut workbook = Workbook::open(dir).unwrap();

    let accounts = Table::from_records([
        vec![
            field(display::ACCOUNT_ID, "800002"),
            field(display::ACCOUNT_NAME, "800002 Savings"),
            field(display::TOTAL_BALANCE, "$1,000.00"),
            field(display::AVAILABLE_BALANCE, "$1,000.00"),
        ],
        vec![
            field(display::ACCOUNT_ID, "800003"),
            field(display::ACCOUNT_NAME, "800003 Checking"),
            field(display::TOTAL_BALANCE, "($25.00)"),
            field(display::AVAILABLE_BALANCE, "($25.00)"),
        ],
    ]);
    let transactions = Table::from_records([
        vec![
            field(display::TXN_ID, "101"),
            field(display::TXN_TIME, "2025-03-01 10:00"),
            field(display::TXN_ACCOUNT_ID, "800002"),
            field(display::TXN_ACTION, "Deposit"),
            field(display::TXN_DEBIT, Cell::Empty),
            field(display::TXN_CREDIT, dec!(200.00)),
        ],
        vec![
            field(display::TXN_ID, "102"),
            field(display::TXN_TIME, "2025-03-02 11:30"),
            field(display::TXN_ACCOUNT_ID, "800002"),
            field(display::TXN_ACTION, "Withdrawal"),
            field(display::TXN_DEBIT, dec!(50.00)),
            field(display::TXN_CREDIT, Cell::Empty),
        ],
        // Totals row appended under the table
        vec![
            field(display::TXN_ID, Cell::Empty),
            field(display::TXN_DEBIT, dec!(50.00)),
            field(display::TXN_CREDIT, dec!(200.00)),
        ],
    ]);
    workbook.write_sheet(ACCOUNT_SUMMARY, &accounts).unwrap();
    workbook.write_sheet(FILTERED_TRANSACTIONS, &transactions).unwrap();
    workbook.save().unwrap();

    let reopened = Workbook::open(dir).unwrap();
    let accounts = reopened.read_sheet(ACCOUNT_SUMMARY).unwrap().unwrap();
    let mut transactions = reopened.read_sheet(FILTERED_TRANSACTIONS).unwrap().unwrap();
    drop_summary_rows(&mut transactions);
    (accounts, transactions)
}

#[test]
fn test_reconcile_against_reloaded_sheets() {
    let dir = tempfile::tempdir().unwrap();
    let (web_accounts, web_transactions) = reloaded_web_sheets(dir.path());
    assert_eq!(web_transactions.len(), 2);

    let api_accounts = accounts_table(&[
        api_account("800002", dec!(1000.00)),
        api_account("800003", dec!(-20.00)),
        api_account("800004", dec!(5.00)),
    ]);
    let api_transactions = transactions_table(&[
        api_txn("800002", "101", dec!(0), dec!(200.00)),
        api_txn("800002", "102", dec!(50.00), dec!(0)),
    ]);

    let report = ReconciliationReport::build(
        &context(),
        &api_accounts,
        &api_transactions,
        Some(&web_accounts),
        Some(&web_transactions),
    );

    let accounts = &report.account_reconciliation;
    let statuses: Vec<String> = accounts
        .rows()
        .map(|row| format!("{}={}", row.get("account_id"), row.get("match_status")))
        .collect();
    assert_eq!(
        statuses,
        vec!["800002=Match", "800003=Variance", "800004=DataMissing"]
    );
    assert_eq!(accounts.get(1, "balance_variance"), &Cell::Number(dec!(5.00)));
    assert_eq!(accounts.get(1, "balance_web"), &Cell::Number(dec!(-25.00)));

    let txns = &report.transaction_reconciliation;
    assert_eq!(txns.len(), 1);
    assert_eq!(txns.get(0, "api_txn_count"), &Cell::Integer(2));
    assert_eq!(txns.get(0, "web_txn_count"), &Cell::Integer(2));
    assert_eq!(txns.get(0, "net_variance"), &Cell::Number(dec!(0)));
    assert_eq!(txns.get(0, "match_status"), &Cell::from("Match"));

    let json = serde_json::to_value(&report.variance_summary).unwrap();
    assert_eq!(json[4]["Metric"], "Account Matches");
    assert_eq!(json[4]["Count"], 1);
    assert_eq!(json[5]["Count"], 1);
}

#[test]
fn test_report_sections_write_to_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let report = ReconciliationReport::build(
        &context(),
        &Table::default(),
        &Table::default(),
        None,
        None,
    );
    assert_eq!(
        report.account_reconciliation.get(0, "Status"),
        &Cell::from("No account data available from API or Web")
    );

    let mut workbook = Workbook::open(dir.path()).unwrap();
    workbook
        .write_sections("API_Data_Validation", &report.datasets())
        .unwrap();
    for (section, _) in report.datasets() {
        assert!(dir
            .path()
            .join(format!("API_Data_Validation.{}.csv", section))
            .exists());
    }
}
