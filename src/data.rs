//! Cell values, column roles, and best-effort coercion of raw text.
//!
//! Column roles are decided from the header name alone: anything containing
//! `date` is a [`ColumnRole::Date`], anything containing one of the numeric
//! tokens is [`ColumnRole::Numeric`], everything else is free text. Coercion
//! never fails; a value that cannot be read under its role becomes `None`.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

/// Replacement for missing free-text cells.
pub const UNKNOWN: &str = "Unknown";

/// Header substrings (lowercase) that mark a column as numeric.
pub const NUMERIC_NAME_TOKENS: &[&str] = &["amount", "qty", "pcs", "rate", "gross amt", "mrp"];

const DATE_NAME_TOKEN: &str = "date";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    Date,
    Numeric,
    Text,
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnRole::Date => "date",
            ColumnRole::Numeric => "numeric",
            ColumnRole::Text => "text",
        };
        f.write_str(label)
    }
}

/// Classifies a column by case-insensitive substring match on its name.
///
/// The date token wins over the numeric vocabulary, so `Amount Date` is a
/// date column.
pub fn classify_column(name: &str) -> ColumnRole {
    let lowered = name.to_lowercase();
    if lowered.contains(DATE_NAME_TOKEN) {
        ColumnRole::Date
    } else if NUMERIC_NAME_TOKENS
        .iter()
        .any(|token| lowered.contains(token))
    {
        ColumnRole::Numeric
    } else {
        ColumnRole::Text
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Text(String),
    Number(Decimal),
    Date(NaiveDate),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(d) => d.normalize().to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Number(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Default placeholder tokens read as missing, matched against the trimmed cell.
pub const DEFAULT_MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub fn is_missing(raw: &str, tokens: &[String]) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || tokens.iter().any(|token| token == trimmed)
}

/// Reads `raw` under `role`, or `None` when it is missing or unparseable.
pub fn coerce_value(raw: &str, role: ColumnRole, missing_tokens: &[String]) -> Option<Value> {
    if is_missing(raw, missing_tokens) {
        return None;
    }
    match role {
        ColumnRole::Date => parse_naive_date(raw).map(Value::Date),
        ColumnRole::Numeric => parse_number(raw).map(Value::Number),
        ColumnRole::Text => Some(Value::Text(raw.to_string())),
    }
}

// Two-digit-year formats come first: `%Y` happily reads "22" as year 22.
const DATE_FORMATS: &[&str] = &[
    "%m-%d-%y",
    "%m/%d/%y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
];

/// Parses a calendar date, month-first when a value is ambiguous.
///
/// Timestamps are truncated to their date. Years outside 1000..=9999 are
/// rejected so short numeric strings do not turn into first-century dates.
pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let plausible = |date: &NaiveDate| (1000..=9999).contains(&date.year());
    DATE_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .find(plausible)
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .filter_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                .map(|dt| dt.date())
                .find(plausible)
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.date_naive())
                .filter(plausible)
        })
}

/// Parses a plain or scientific-notation decimal number.
pub fn parse_number(value: &str) -> Option<Decimal> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

/// A sales amount, or `None` when it is negative.
pub fn non_negative_amount(value: Decimal) -> Option<Decimal> {
    (value.is_zero() || value.is_sign_positive()).then_some(value)
}

/// A unit count, or `None` when it is negative or fractional.
pub fn unit_count(value: Decimal) -> Option<u64> {
    if value.is_sign_negative() && !value.is_zero() {
        return None;
    }
    if !value.fract().is_zero() {
        return None;
    }
    value.trunc().to_u64()
}

/// `YYYY-MM` bucket for a date.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn default_missing_tokens() -> Vec<String> {
    DEFAULT_MISSING_TOKENS
        .iter()
        .map(|token| token.to_string())
        .collect()
}
