//! Filter-and-aggregate engine behind the dashboard.
//!
//! [`aggregate`] filters the table and reduces the surviving records to four
//! KPIs and four grouped series. An empty selection is a normal outcome: all
//! KPIs are zero, the top category is [`NO_CATEGORY`], and every series is empty.
//!
//! Ordering rules for ties:
//! - `top_category`: among the categories with the highest count, the one
//!   whose first record comes earliest in table order.
//! - category, status and region series: sorted by value descending with a
//!   stable sort over first-appearance order, so equal values keep the order in
//!   which their groups first appeared. The region cutoff keeps whichever tied
//!   groups fall inside the first N under that order.
//!
//! [`UNKNOWN`](crate::data::UNKNOWN) is an ordinary label here.
//!
//! Every total is accumulated with checked addition; a sum that leaves the
//! `Decimal` range is reported as an error.

use std::{
    collections::{BTreeMap, HashMap},
    hash::Hash,
};

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    config::DEFAULT_TOP_REGIONS,
    filter::FilterSelection,
    sales::{SalesRecord, SalesTable, SalesView},
};

/// Top-category label reported when no records match.
pub const NO_CATEGORY: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> SeriesPoint<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Self { key, value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateResult {
    pub total_revenue: Decimal,
    pub total_orders: usize,
    pub avg_order_value: Decimal,
    pub top_category: String,
    pub daily_revenue: Vec<SeriesPoint<NaiveDate, Decimal>>,
    pub category_revenue: Vec<SeriesPoint<String, Decimal>>,
    pub status_distribution: Vec<SeriesPoint<String, usize>>,
    pub top_regions: Vec<SeriesPoint<String, Decimal>>,
}

impl AggregateResult {
    pub fn empty() -> Self {
        Self {
            total_revenue: Decimal::ZERO,
            total_orders: 0,
            avg_order_value: Decimal::ZERO,
            top_category: NO_CATEGORY.to_string(),
            daily_revenue: Vec::new(),
            category_revenue: Vec::new(),
            status_distribution: Vec::new(),
            top_regions: Vec::new(),
        }
    }
}

/// Groups keyed in order of first appearance.
pub(crate) struct OrderedGroups<K, V> {
    index: HashMap<K, usize>,
    groups: Vec<(K, V)>,
}

impl<K: Hash + Eq + Clone, V: Default> OrderedGroups<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }

    pub(crate) fn entry(&mut self, key: &K) -> &mut V {
        let slot = match self.index.get(key) {
            Some(slot) => *slot,
            None => {
                self.index.insert(key.clone(), self.groups.len());
                self.groups.push((key.clone(), V::default()));
                self.groups.len() - 1
            }
        };
        &mut self.groups[slot].1
    }

    pub(crate) fn into_vec(self) -> Vec<(K, V)> {
        self.groups
    }
}

/// Running totals that report overflow instead of panicking.
pub(crate) trait Accumulate: Copy + Default + Ord {
    fn accumulate(self, other: Self) -> Option<Self>;
}

impl Accumulate for Decimal {
    fn accumulate(self, other: Self) -> Option<Self> {
        self.checked_add(other)
    }
}

impl Accumulate for usize {
    fn accumulate(self, other: Self) -> Option<Self> {
        self.checked_add(other)
    }
}

pub(crate) fn overflow(what: &str) -> anyhow::Error {
    anyhow!("{what} exceeds the supported decimal range")
}

/// Adds `value` into `total`, failing with a message naming `what` on overflow.
pub(crate) fn add_into<V: Accumulate>(total: &mut V, value: V, what: &str) -> Result<()> {
    *total = total.accumulate(value).ok_or_else(|| overflow(what))?;
    Ok(())
}

/// Groups by `key`, then sorts by value descending; ties keep first-appearance order.
pub(crate) fn ranked<K, V, F, G>(
    records: &[&SalesRecord],
    key: F,
    value: G,
    what: &str,
) -> Result<Vec<SeriesPoint<K, V>>>
where
    K: Hash + Eq + Clone,
    V: Accumulate,
    F: Fn(&SalesRecord) -> K,
    G: Fn(&SalesRecord) -> V,
{
    let mut groups = OrderedGroups::<K, V>::new();
    for &record in records {
        add_into(groups.entry(&key(record)), value(record), what)?;
    }
    let mut points = groups.into_vec();
    points.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(points
        .into_iter()
        .map(|(key, value)| SeriesPoint::new(key, value))
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregator {
    pub top_regions: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            top_regions: DEFAULT_TOP_REGIONS,
        }
    }
}

impl Aggregator {
    pub fn new(top_regions: usize) -> Self {
        Self { top_regions }
    }

    pub fn aggregate(
        &self,
        table: &SalesTable,
        selection: &FilterSelection,
    ) -> Result<AggregateResult> {
        if selection.is_unrestricted() {
            return self.summarize(&table.view());
        }
        debug!("Aggregating with selection {selection:?}");
        self.summarize(&table.filter(selection))
    }

    /// Fails only when a revenue total leaves the decimal range.
    pub fn summarize(&self, view: &SalesView<'_>) -> Result<AggregateResult> {
        let records = view.records();
        if records.is_empty() {
            return Ok(AggregateResult::empty());
        }

        let mut total_revenue = Decimal::ZERO;
        let mut daily = BTreeMap::new();
        for record in records {
            add_into(&mut total_revenue, record.revenue(), "Total revenue")?;
            if let Some(date) = record.date {
                add_into(
                    daily.entry(date).or_insert(Decimal::ZERO),
                    record.revenue(),
                    "Daily revenue",
                )?;
            }
        }
        let total_orders = records.len();
        let avg_order_value = total_revenue / Decimal::from(total_orders);

        let mut top_regions = ranked(
            records,
            |r| r.region.clone(),
            SalesRecord::revenue,
            "Region revenue",
        )?;
        top_regions.truncate(self.top_regions);

        Ok(AggregateResult {
            total_revenue,
            total_orders,
            avg_order_value,
            top_category: top_category(records),
            daily_revenue: daily
                .into_iter()
                .map(|(date, revenue)| SeriesPoint::new(date, revenue))
                .collect(),
            category_revenue: ranked(
                records,
                |r| r.category.clone(),
                SalesRecord::revenue,
                "Category revenue",
            )?,
            status_distribution: ranked(
                records,
                |r| r.status.clone(),
                |_| 1usize,
                "Status count",
            )?,
            top_regions,
        })
    }
}

/// Aggregates with the default region cutoff.
pub fn aggregate(table: &SalesTable, selection: &FilterSelection) -> Result<AggregateResult> {
    Aggregator::default().aggregate(table, selection)
}

fn top_category(records: &[&SalesRecord]) -> String {
    let mut counts = OrderedGroups::<&str, usize>::new();
    for record in records {
        *counts.entry(&record.category.as_str()) += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (category, count) in counts.into_vec() {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((category, count));
        }
    }
    best.map(|(category, _)| category.to_string())
        .unwrap_or_else(|| NO_CATEGORY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2024, 1, d)
    }

    fn amount(value: i64) -> Option<Decimal> {
        Some(Decimal::from(value))
    }

    #[test]
    fn top_category_breaks_ties_by_first_appearance() {
        let table = SalesTable::from_records(vec![
            SalesRecord::new(day(1), amount(5), "B", "Shipped", "X"),
            SalesRecord::new(day(1), amount(5), "A", "Shipped", "X"),
            SalesRecord::new(day(2), amount(5), "A", "Shipped", "X"),
            SalesRecord::new(day(2), amount(5), "B", "Shipped", "X"),
        ]);
        assert_eq!(aggregate(&table, &FilterSelection::all()).expect("aggregate").top_category, "B");
    }

    #[test]
    fn daily_series_is_ascending_and_skips_missing_dates() {
        let table = SalesTable::from_records(vec![
            SalesRecord::new(day(3), amount(10), "A", "Shipped", "X"),
            SalesRecord::new(None, amount(99), "A", "Shipped", "X"),
            SalesRecord::new(day(1), amount(4), "A", "Shipped", "X"),
            SalesRecord::new(day(3), None, "A", "Shipped", "X"),
            SalesRecord::new(day(1), amount(6), "A", "Shipped", "X"),
        ]);
        let result = aggregate(&table, &FilterSelection::all()).expect("aggregate");
        assert_eq!(
            result.daily_revenue,
            vec![
                SeriesPoint::new(day(1).unwrap(), Decimal::from(10)),
                SeriesPoint::new(day(3).unwrap(), Decimal::from(10)),
            ]
        );
        assert_eq!(result.total_revenue, Decimal::from(119));
    }

    #[test]
    fn region_series_is_cut_at_configured_size() {
        let records = (0..15)
            .map(|i| SalesRecord::new(day(1), amount(i), "A", "Shipped", &format!("R{i:02}")))
            .collect();
        let table = SalesTable::from_records(records);

        let result = aggregate(&table, &FilterSelection::all()).expect("aggregate");
        assert_eq!(result.top_regions.len(), 10);
        assert_eq!(result.top_regions[0].key, "R14");
        assert_eq!(result.top_regions[9].key, "R05");

        let narrow = Aggregator::new(3)
            .aggregate(&table, &FilterSelection::all())
            .expect("aggregate");
        let keys: Vec<&str> = narrow.top_regions.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["R14", "R13", "R12"]);
    }

    #[test]
    fn equal_revenues_keep_first_appearance_order() {
        let table = SalesTable::from_records(vec![
            SalesRecord::new(day(1), amount(5), "Kurta", "Shipped", "Y"),
            SalesRecord::new(day(1), amount(5), "Set", "Shipped", "X"),
            SalesRecord::new(day(1), amount(7), "Top", "Pending", "Z"),
        ]);
        let result = aggregate(&table, &FilterSelection::all()).expect("aggregate");
        let categories: Vec<&str> = result
            .category_revenue
            .iter()
            .map(|p| p.key.as_str())
            .collect();
        assert_eq!(categories, vec!["Top", "Kurta", "Set"]);
        assert_eq!(
            result.status_distribution,
            vec![
                SeriesPoint::new("Shipped".to_string(), 2),
                SeriesPoint::new("Pending".to_string(), 1),
            ]
        );
    }

    #[test]
    fn average_divides_revenue_by_all_orders() {
        let table = SalesTable::from_records(vec![
            SalesRecord::new(day(1), amount(90), "A", "Shipped", "X"),
            SalesRecord::new(day(1), None, "A", "Cancelled", "X"),
            SalesRecord::new(day(1), amount(30), "A", "Shipped", "X"),
        ]);
        let result = aggregate(&table, &FilterSelection::all()).expect("aggregate");
        assert_eq!(result.total_orders, 3);
        assert_eq!(result.avg_order_value, Decimal::from(40));
    }

    #[test]
    fn revenue_overflow_is_an_error() {
        let huge = Decimal::from_scientific("5e28").expect("in range");
        let table = SalesTable::from_records(vec![
            SalesRecord::new(day(1), Some(huge), "A", "Shipped", "X"),
            SalesRecord::new(day(2), Some(huge), "A", "Shipped", "X"),
        ]);
        let err = aggregate(&table, &FilterSelection::all()).expect_err("sum overflows");
        assert!(err.to_string().contains("Total revenue exceeds"));

        let single = SalesTable::from_records(vec![SalesRecord::new(
            day(1),
            Some(huge),
            "A",
            "Shipped",
            "X",
        )]);
        assert!(aggregate(&single, &FilterSelection::all()).is_ok());
    }
}
