//! The canonical sales table held in memory while answering queries.
//!
//! A [`SalesTable`] is built once, either by loading a cleaned file or from an
//! in-memory [`CleanedTable`], and is only ever read afterwards. Filtering
//! produces a [`SalesView`] of borrowed records.

use std::{collections::BTreeSet, path::Path};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use log::info;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    cleaner::{self, CleanedTable},
    config::{CleaningOptions, ColumnBindings},
    data::{
        ColumnRole, UNKNOWN, Value, coerce_value, month_key, non_negative_amount, unit_count,
    },
    filter::FilterSelection,
    io_utils::DecodePolicy,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesRecord {
    pub date: Option<NaiveDate>,
    pub month: Option<String>,
    pub amount: Option<Decimal>,
    pub quantity: Option<u64>,
    pub category: String,
    pub status: String,
    pub region: String,
    pub fulfilment: Option<String>,
}

impl SalesRecord {
    pub fn new(
        date: Option<NaiveDate>,
        amount: Option<Decimal>,
        category: &str,
        status: &str,
        region: &str,
    ) -> Self {
        Self {
            date,
            month: date.map(month_key),
            amount,
            quantity: None,
            category: category.to_string(),
            status: status.to_string(),
            region: region.to_string(),
            fulfilment: None,
        }
    }

    pub fn with_quantity(mut self, quantity: Option<u64>) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_fulfilment(mut self, fulfilment: &str) -> Self {
        self.fulfilment = Some(fulfilment.to_string());
        self
    }

    /// Amount with null read as zero, for summation.
    pub fn revenue(&self) -> Decimal {
        self.amount.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SalesTable {
    records: Vec<SalesRecord>,
    has_fulfilment: bool,
}

struct BoundColumns {
    date: usize,
    amount: usize,
    category: usize,
    status: usize,
    region: usize,
    quantity: Option<usize>,
    fulfilment: Option<usize>,
}

impl BoundColumns {
    /// An exact header match wins; otherwise the first header equal to the
    /// binding ignoring ASCII case, so `fulfilled-by` binds `Fulfilled-by`.
    fn resolve(headers: &[String], bindings: &ColumnBindings) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .or_else(|| headers.iter().position(|h| h.eq_ignore_ascii_case(name)))
        };
        let require =
            |name: &str| find(name).ok_or_else(|| anyhow!("Column '{name}' not found in table"));
        Ok(Self {
            date: require(&bindings.date)?,
            amount: require(&bindings.amount)?,
            category: require(&bindings.category)?,
            status: require(&bindings.status)?,
            region: require(&bindings.region)?,
            quantity: find(&bindings.quantity),
            fulfilment: find(&bindings.fulfilment),
        })
    }
}

fn text_cell(value: Option<Value>) -> String {
    match value {
        Some(Value::Text(s)) => s,
        Some(other) => other.as_display(),
        None => UNKNOWN.to_string(),
    }
}

impl SalesTable {
    pub fn from_records(records: Vec<SalesRecord>) -> Self {
        let has_fulfilment = records.iter().any(|r| r.fulfilment.is_some());
        Self {
            records,
            has_fulfilment,
        }
    }

    /// Loads a cleaned file. Cells are re-coerced under the bound columns'
    /// roles, so the table is usable even if the file was edited by hand.
    pub fn load(
        path: &Path,
        delimiter: u8,
        policy: &DecodePolicy,
        bindings: &ColumnBindings,
        options: &CleaningOptions,
    ) -> Result<Self> {
        let raw = cleaner::read_raw_table(path, delimiter, policy)
            .with_context(|| format!("Loading sales table from {path:?}"))?;
        let headers = cleaner::standardize_headers(&raw.headers);
        let bound = BoundColumns::resolve(&headers, bindings)
            .with_context(|| format!("Binding columns of {path:?}"))?;
        let tokens = &options.missing_tokens;
        let cell = |row: &[String], idx: usize, role: ColumnRole| {
            coerce_value(row.get(idx).map(String::as_str).unwrap_or(""), role, tokens)
        };

        let records = raw
            .rows
            .iter()
            .map(|row| {
                let date = cell(row, bound.date, ColumnRole::Date).and_then(|v| v.as_date());
                SalesRecord {
                    date,
                    month: date.map(month_key),
                    amount: cell(row, bound.amount, ColumnRole::Numeric)
                        .and_then(|v| v.as_number())
                        .and_then(non_negative_amount),
                    quantity: bound
                        .quantity
                        .and_then(|idx| cell(row, idx, ColumnRole::Numeric))
                        .and_then(|v| v.as_number())
                        .and_then(unit_count),
                    category: text_cell(cell(row, bound.category, ColumnRole::Text)),
                    status: text_cell(cell(row, bound.status, ColumnRole::Text)),
                    region: text_cell(cell(row, bound.region, ColumnRole::Text)),
                    fulfilment: bound
                        .fulfilment
                        .map(|idx| text_cell(cell(row, idx, ColumnRole::Text))),
                }
            })
            .collect::<Vec<_>>();

        info!("Loaded {} sales record(s) from {path:?}", records.len());
        Ok(Self {
            records,
            has_fulfilment: bound.fulfilment.is_some(),
        })
    }

    /// Builds the table straight from a cleaning result.
    pub fn from_cleaned(table: &CleanedTable, bindings: &ColumnBindings) -> Result<Self> {
        let bound = BoundColumns::resolve(&table.headers(), bindings)?;
        let records = table
            .rows
            .iter()
            .map(|row| {
                let get = |idx: usize| row.get(idx).cloned().flatten();
                let date = get(bound.date).and_then(|v| v.as_date());
                SalesRecord {
                    date,
                    month: date.map(month_key),
                    amount: get(bound.amount)
                        .and_then(|v| v.as_number())
                        .and_then(non_negative_amount),
                    quantity: bound
                        .quantity
                        .and_then(get)
                        .and_then(|v| v.as_number())
                        .and_then(unit_count),
                    category: text_cell(get(bound.category)),
                    status: text_cell(get(bound.status)),
                    region: text_cell(get(bound.region)),
                    fulfilment: bound.fulfilment.map(|idx| text_cell(get(idx))),
                }
            })
            .collect();
        Ok(Self {
            records,
            has_fulfilment: bound.fulfilment.is_some(),
        })
    }

    pub fn records(&self) -> &[SalesRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_fulfilment(&self) -> bool {
        self.has_fulfilment
    }

    pub fn view(&self) -> SalesView<'_> {
        SalesView {
            records: self.records.iter().collect(),
        }
    }

    pub fn filter(&self, selection: &FilterSelection) -> SalesView<'_> {
        self.view().filter(selection)
    }

    /// Distinct, sorted values offered for each filter dimension.
    pub fn filter_options(&self) -> FilterOptions {
        let mut months = BTreeSet::new();
        let mut categories = BTreeSet::new();
        let mut regions = BTreeSet::new();
        for record in &self.records {
            if let Some(month) = &record.month {
                months.insert(month.clone());
            }
            categories.insert(record.category.clone());
            regions.insert(record.region.clone());
        }
        FilterOptions {
            months: months.into_iter().collect(),
            categories: categories.into_iter().collect(),
            regions: regions.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub months: Vec<String>,
    pub categories: Vec<String>,
    pub regions: Vec<String>,
}

/// Borrowed subset of a table, in table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesView<'a> {
    records: Vec<&'a SalesRecord>,
}

impl<'a> SalesView<'a> {
    pub fn filter(&self, selection: &FilterSelection) -> SalesView<'a> {
        SalesView {
            records: self
                .records
                .iter()
                .copied()
                .filter(|record| selection.matches(record))
                .collect(),
        }
    }

    pub fn records(&self) -> &[&'a SalesRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::{RawTable, clean};

    fn day(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn from_cleaned_binds_named_columns() {
        let raw = RawTable {
            headers: ["Date", "Amount", "Qty", "Category", "Status", "ship-state"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            rows: vec![
                ["04-30-22", "647.62", "1", "Set", "Shipped", "MAHARASHTRA"]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                ["oops", "", "", "", "Cancelled", ""]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
            ],
        };
        let outcome = clean(&raw, &CleaningOptions::default());
        let table =
            SalesTable::from_cleaned(&outcome.table, &ColumnBindings::default()).expect("bind");

        assert_eq!(table.len(), 2);
        let first = &table.records()[0];
        assert_eq!(first.date, day(2022, 4, 30));
        assert_eq!(first.month.as_deref(), Some("2022-04"));
        assert_eq!(first.amount, Some(Decimal::new(64762, 2)));
        assert_eq!(first.quantity, Some(1));
        let second = &table.records()[1];
        assert_eq!(second.date, None);
        assert_eq!(second.category, UNKNOWN);
        assert_eq!(second.region, UNKNOWN);
        assert!(!table.has_fulfilment());
    }

    #[test]
    fn from_cleaned_reports_missing_required_column() {
        let raw = RawTable {
            headers: vec!["Date".to_string(), "Amount".to_string()],
            rows: vec![],
        };
        let outcome = clean(&raw, &CleaningOptions::default());
        let err = SalesTable::from_cleaned(&outcome.table, &ColumnBindings::default())
            .expect_err("category is missing");
        assert!(err.to_string().contains("Category"));
    }

    #[test]
    fn filter_options_are_sorted_and_skip_missing_months() {
        let table = SalesTable::from_records(vec![
            SalesRecord::new(day(2022, 5, 2), None, "Top", "Shipped", "KERALA"),
            SalesRecord::new(None, None, "Kurta", "Shipped", "ASSAM"),
            SalesRecord::new(day(2022, 4, 9), None, "Kurta", "Pending", "KERALA"),
        ]);
        let options = table.filter_options();
        assert_eq!(options.months, vec!["2022-04", "2022-05"]);
        assert_eq!(options.categories, vec!["Kurta", "Top"]);
        assert_eq!(options.regions, vec!["ASSAM", "KERALA"]);
    }

    #[test]
    fn negative_amounts_and_fractional_quantities_read_as_missing() {
        let raw = RawTable {
            headers: ["Date", "Amount", "Qty", "Category", "Status", "ship-state"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            rows: vec![
                ["2022-04-01", "-120", "1.5", "Set", "Shipped", "GOA"]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                ["2022-04-02", "80", "-2", "Set", "Shipped", "GOA"]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
            ],
        };
        let outcome = clean(&raw, &CleaningOptions::default());
        let table =
            SalesTable::from_cleaned(&outcome.table, &ColumnBindings::default()).expect("bind");

        assert_eq!(table.records()[0].amount, None);
        assert_eq!(table.records()[0].quantity, None);
        assert_eq!(table.records()[1].amount, Some(Decimal::from(80)));
        assert_eq!(table.records()[1].quantity, None);
    }

    #[test]
    fn bindings_fall_back_to_case_insensitive_headers() {
        let raw = RawTable {
            headers: ["date", "Amount", "Category", "Status", "ship-state", "fulfilled-by"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            rows: vec![
                ["2022-04-01", "10", "Set", "Shipped", "GOA", "Easy Ship"]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
            ],
        };
        let outcome = clean(&raw, &CleaningOptions::default());
        let table =
            SalesTable::from_cleaned(&outcome.table, &ColumnBindings::default()).expect("bind");

        assert!(table.has_fulfilment());
        let record = &table.records()[0];
        assert_eq!(record.fulfilment.as_deref(), Some("Easy Ship"));
        assert_eq!(record.date, day(2022, 4, 1));
    }
}
