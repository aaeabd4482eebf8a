//! Parsing of the text cells found in the published tax and rebate tables.
//!
//! The published tables render amounts with space (or non-breaking space)
//! thousand separators, ranges with an en dash, and the top bracket as
//! "… and above". Fetching the page itself is not handled here.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use tax_core::TaxBracket;
use thiserror::Error;

use crate::brackets::TaxPeriodRecord;

/// Upper bound the published data uses in place of "no limit".
pub const UNBOUNDED_SENTINEL: i64 = 9_999_999_999;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishedCellError {
    #[error("unrecognised income range '{0}'")]
    IncomeRange(String),

    #[error("unrecognised rate cell '{0}'")]
    Rate(String),

    #[error("unrecognised currency amount '{0}'")]
    Currency(String),
}

/// `None` when `max` is the published sentinel.
pub fn bound_or_unbounded(max: Decimal) -> Option<Decimal> {
    (max != Decimal::from(UNBOUNDED_SENTINEL)).then_some(max)
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|error| panic!("published cell regex failed to compile: {error}"))
}

static RANGE_RE: OnceLock<Regex> = OnceLock::new();
static ABOVE_RE: OnceLock<Regex> = OnceLock::new();
static RATE_RE: OnceLock<Regex> = OnceLock::new();
static CURRENCY_RE: OnceLock<Regex> = OnceLock::new();

fn range_regex() -> &'static Regex {
    RANGE_RE.get_or_init(|| compile(r"^\s*([\d\s,]+?)\s*[–—-]\s*([\d\s,]+?)\s*$"))
}

fn above_regex() -> &'static Regex {
    ABOVE_RE.get_or_init(|| compile(r"(?i)^\s*([\d\s,]+?)\s*and\s+above\s*$"))
}

fn rate_regex() -> &'static Regex {
    RATE_RE.get_or_init(|| compile(r"^\s*(?:R?\s*([\d\s,]+?)\s*\+\s*)?(\d{1,3})\s*%"))
}

fn currency_regex() -> &'static Regex {
    CURRENCY_RE.get_or_init(|| compile(r"^\s*R?\s*([\d\s,]+(?:\.\d+)?)\s*$"))
}

/// Strips thousand separators (spaces, non-breaking spaces, commas).
fn amount(digits: &str) -> Option<Decimal> {
    let cleaned: String = digits
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    cleaned.parse().ok()
}

/// `"1 – 237 100"` → `(1, Some(237100))`; `"1 817 001 and above"` →
/// `(1817001, None)`. A sentinel upper bound is also treated as unbounded.
pub fn parse_income_range(cell: &str) -> Result<(Decimal, Option<Decimal>), PublishedCellError> {
    let err = || PublishedCellError::IncomeRange(cell.to_string());

    if let Some(caps) = above_regex().captures(cell) {
        let min = amount(&caps[1]).ok_or_else(err)?;
        return Ok((min, None));
    }

    let caps = range_regex().captures(cell).ok_or_else(err)?;
    let min = amount(&caps[1]).ok_or_else(err)?;
    let max = amount(&caps[2]).ok_or_else(err)?;
    if max < min {
        return Err(err());
    }
    Ok((min, bound_or_unbounded(max)))
}

/// `"18% of taxable income"` → `(0, 18)`;
/// `"42 678 + 26% of taxable income above 237 100"` → `(42678, 26)`.
pub fn parse_rate(cell: &str) -> Result<(Decimal, u8), PublishedCellError> {
    let err = || PublishedCellError::Rate(cell.to_string());

    let caps = rate_regex().captures(cell).ok_or_else(err)?;
    let base_tax = match caps.get(1) {
        Some(base) => amount(base.as_str()).ok_or_else(err)?,
        None => Decimal::ZERO,
    };
    let rate_percent: u8 = caps[2].parse().map_err(|_| err())?;
    if rate_percent > 100 {
        return Err(err());
    }
    Ok((base_tax, rate_percent))
}

/// `"R17 235"` → `17235`.
pub fn parse_currency(cell: &str) -> Result<Decimal, PublishedCellError> {
    let err = || PublishedCellError::Currency(cell.to_string());

    let caps = currency_regex().captures(cell).ok_or_else(err)?;
    amount(&caps[1]).ok_or_else(err)
}

/// One row of the published tax table: the income-range and rate cells.
pub fn parse_bracket_row(
    range_cell: &str,
    rate_cell: &str,
) -> Result<TaxBracket, PublishedCellError> {
    let (min_income, max_income) = parse_income_range(range_cell)?;
    let (base_tax, rate_percent) = parse_rate(rate_cell)?;
    Ok(TaxBracket {
        min_income,
        max_income,
        base_tax,
        rate_percent,
    })
}

/// One bracket as copied from the published table, with the period it
/// belongs to.
///
/// Columns: `period`, `financial_year`, `effective_date`, `end_date`,
/// `taxable_income` (e.g. `1 – 237 100` or `1 817 001 and above`) and
/// `rates_of_tax` (e.g. `42 678 + 26% of taxable income above 237 100`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PublishedBracketRecord {
    pub period: String,
    pub financial_year: i32,
    pub effective_date: NaiveDate,
    pub end_date: NaiveDate,
    pub taxable_income: String,
    pub rates_of_tax: String,
}

impl PublishedBracketRecord {
    pub fn to_record(&self) -> Result<TaxPeriodRecord, PublishedCellError> {
        let bracket = parse_bracket_row(&self.taxable_income, &self.rates_of_tax)?;
        Ok(TaxPeriodRecord {
            period: self.period.clone(),
            financial_year: self.financial_year,
            effective_date: self.effective_date,
            end_date: self.end_date,
            min_income: bracket.min_income,
            max_income: bracket.max_income,
            base_tax: bracket.base_tax,
            rate_percent: bracket.rate_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn income_range_with_en_dash_and_spaces() {
        assert_eq!(
            parse_income_range("1 – 237 100"),
            Ok((dec!(1), Some(dec!(237100))))
        );
        assert_eq!(
            parse_income_range("237 101 – 370 500"),
            Ok((dec!(237101), Some(dec!(370500))))
        );
    }

    #[test]
    fn income_range_with_non_breaking_spaces() {
        assert_eq!(
            parse_income_range("857\u{a0}901 – 1\u{a0}817\u{a0}000"),
            Ok((dec!(857901), Some(dec!(1817000))))
        );
    }

    #[test]
    fn income_range_and_above_is_unbounded() {
        assert_eq!(
            parse_income_range("1 817 001 and above"),
            Ok((dec!(1817001), None))
        );
    }

    #[test]
    fn sentinel_upper_bound_is_unbounded() {
        assert_eq!(
            parse_income_range("1817001 - 9999999999"),
            Ok((dec!(1817001), None))
        );
    }

    #[test]
    fn income_range_rejects_garbage_and_inverted() {
        assert!(parse_income_range("Taxable income (R)").is_err());
        assert!(parse_income_range("500 – 100").is_err());
    }

    #[test]
    fn rate_without_base() {
        assert_eq!(parse_rate("18% of taxable income"), Ok((dec!(0), 18)));
    }

    #[test]
    fn rate_with_base() {
        assert_eq!(
            parse_rate("42 678 + 26% of taxable income above 237 100"),
            Ok((dec!(42678), 26))
        );
        assert_eq!(
            parse_rate("644 489 + 45% of taxable income above 1 817 000"),
            Ok((dec!(644489), 45))
        );
    }

    #[test]
    fn rate_rejects_missing_percent() {
        assert_eq!(
            parse_rate("see note"),
            Err(PublishedCellError::Rate("see note".to_string()))
        );
        assert!(parse_rate("250%").is_err());
    }

    #[test]
    fn currency_cells() {
        assert_eq!(parse_currency("R17 235"), Ok(dec!(17235)));
        assert_eq!(parse_currency("R9,444"), Ok(dec!(9444)));
        assert_eq!(parse_currency("3145"), Ok(dec!(3145)));
        assert!(parse_currency("n/a").is_err());
    }

    #[test]
    fn bracket_row() {
        let bracket = parse_bracket_row(
            "370 501 – 512 800",
            "77 362 + 31% of taxable income above 370 500",
        )
        .unwrap();

        assert_eq!(
            bracket,
            TaxBracket {
                min_income: dec!(370501),
                max_income: Some(dec!(512800)),
                base_tax: dec!(77362),
                rate_percent: 31,
            }
        );
    }

    #[test]
    fn published_record_becomes_a_bracket_row() {
        let published = PublishedBracketRecord {
            period: "tax_period_2025".to_string(),
            financial_year: 2025,
            effective_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
            taxable_income: "1 817 001 and above".to_string(),
            rates_of_tax: "644 489 + 45% of taxable income above 1 817 000".to_string(),
        };

        let record = published.to_record().unwrap();

        assert_eq!(record.period, "tax_period_2025");
        assert_eq!(record.min_income, dec!(1817001));
        assert_eq!(record.max_income, None);
        assert_eq!(record.base_tax, dec!(644489));
        assert_eq!(record.rate_percent, 45);
    }

    #[test]
    fn published_record_reports_the_bad_cell() {
        let published = PublishedBracketRecord {
            period: "tax_period_2025".to_string(),
            financial_year: 2025,
            effective_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
            taxable_income: "Taxable income (R)".to_string(),
            rates_of_tax: "Rates of tax (R)".to_string(),
        };

        assert_eq!(
            published.to_record(),
            Err(PublishedCellError::IncomeRange("Taxable income (R)".to_string()))
        );
    }
}
