//! Locale-formatted money, date and account-name parsing
//!
//! Both the REST API and the web portal render amounts as display strings
//! (`"$1,234.56"`, `"($100.00)"`, `"-$20.00"`). Everything downstream works
//! on exact [`Decimal`] values.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use tracing::warn;

use crate::error::{Error, Result};

/// Parse a monetary display string into a decimal amount.
///
/// Accounting parentheses mark a negative amount. Currency symbols and
/// thousands separators are dropped. Blank input, or input with no digits
/// at all, is zero.
pub fn parse_money(raw: &str) -> Result<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let negative = trimmed.starts_with('(') && trimmed.ends_with(')');

    let numeric: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if numeric.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let numeric = numeric.strip_suffix('.').unwrap_or(&numeric);
    let amount =
        Decimal::from_str(numeric).map_err(|_| Error::InvalidAmount(raw.to_string()))?;

    Ok(if negative { -amount } else { amount })
}

/// Like [`parse_money`], but logs and substitutes zero for malformed input.
pub fn money_or_zero(raw: &str) -> Decimal {
    parse_money(raw).unwrap_or_else(|e| {
        warn!("{} - using 0.00", e);
        Decimal::ZERO
    })
}

/// Parse a calendar date with a chrono `strftime` format (e.g. `%Y-%m-%d`).
pub fn parse_date(raw: &str, format: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), format).map_err(|source| Error::InvalidDate {
        value: raw.to_string(),
        format: format.to_string(),
        source,
    })
}

/// Parse a timestamp such as `2025-03-01 14:05` with the given format.
pub fn parse_timestamp(raw: &str, format: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), format).map_err(|source| Error::InvalidDate {
        value: raw.to_string(),
        format: format.to_string(),
        source,
    })
}

/// Strip the account-number prefix from a portal account label.
///
/// `"800002 Savings"` becomes `"Savings"`. Single-token labels are
/// returned unchanged.
pub fn clean_account_name(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((_, rest)) if !rest.trim().is_empty() => rest.trim_start().to_string(),
        _ => raw.to_string(),
    }
}
