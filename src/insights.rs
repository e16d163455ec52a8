//! Deep-dive analysis over a sales view: monthly trend and growth, status
//! shares, fulfilment channel revenue, and average unit price per month.
//!
//! Percentages are expressed on a 0-100 scale. Growth figures are `None` when
//! the base month has zero revenue.

use std::collections::BTreeMap;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    aggregate::{SeriesPoint, add_into, overflow, ranked},
    sales::{SalesRecord, SalesView},
};

/// Status label counted as a cancellation.
pub const CANCELLED_STATUS: &str = "Cancelled";

const RECENT_MONTHS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Insights {
    pub monthly_revenue: Vec<SeriesPoint<String, Decimal>>,
    pub overall_growth_pct: Option<Decimal>,
    pub recent_growth_pct: Vec<SeriesPoint<String, Option<Decimal>>>,
    pub status_share_pct: Vec<SeriesPoint<String, Decimal>>,
    pub cancellation_rate_pct: Decimal,
    pub fulfilment_revenue: Option<Vec<SeriesPoint<String, Decimal>>>,
    pub monthly_unit_price: Vec<SeriesPoint<String, Decimal>>,
}

fn percent_change(from: Decimal, to: Decimal) -> Option<Decimal> {
    if from.is_zero() {
        return None;
    }
    to.checked_sub(from)
        .and_then(|delta| delta.checked_div(from))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
}

fn monthly_revenue(records: &[&SalesRecord]) -> Result<Vec<SeriesPoint<String, Decimal>>> {
    let mut months = BTreeMap::new();
    for record in records {
        if let Some(month) = &record.month {
            add_into(
                months.entry(month.clone()).or_insert(Decimal::ZERO),
                record.revenue(),
                "Monthly revenue",
            )?;
        }
    }
    Ok(months
        .into_iter()
        .map(|(month, revenue)| SeriesPoint::new(month, revenue))
        .collect())
}

/// Month-over-month change for every month; the first month has no base.
fn month_over_month(
    monthly: &[SeriesPoint<String, Decimal>],
) -> Vec<SeriesPoint<String, Option<Decimal>>> {
    monthly
        .iter()
        .enumerate()
        .map(|(idx, point)| {
            let change = idx
                .checked_sub(1)
                .and_then(|prev| percent_change(monthly[prev].value, point.value));
            SeriesPoint::new(point.key.clone(), change)
        })
        .collect()
}

fn status_shares(records: &[&SalesRecord]) -> Result<Vec<SeriesPoint<String, Decimal>>> {
    let total = Decimal::from(records.len());
    let counts = ranked(records, |r| r.status.clone(), |_| 1usize, "Status count")?;
    Ok(counts
        .into_iter()
        .map(|point| {
            let share = Decimal::from(point.value) / total * Decimal::ONE_HUNDRED;
            SeriesPoint::new(point.key, share)
        })
        .collect())
}

/// Mean of `Amount / Qty` per month over records carrying both, with Qty non-zero.
fn monthly_unit_price(records: &[&SalesRecord]) -> Result<Vec<SeriesPoint<String, Decimal>>> {
    let mut months: BTreeMap<String, (Decimal, usize)> = BTreeMap::new();
    for record in records {
        let (Some(month), Some(amount), Some(quantity)) =
            (&record.month, record.amount, record.quantity)
        else {
            continue;
        };
        let Some(unit_price) = amount.checked_div(Decimal::from(quantity)) else {
            continue;
        };
        let entry = months.entry(month.clone()).or_default();
        add_into(&mut entry.0, unit_price, "Unit price total")?;
        entry.1 += 1;
    }
    months
        .into_iter()
        .map(|(month, (sum, count))| -> Result<SeriesPoint<String, Decimal>> {
            let mean = sum
                .checked_div(Decimal::from(count))
                .ok_or_else(|| overflow("Mean unit price"))?;
            Ok(SeriesPoint::new(month, mean))
        })
        .collect()
}

/// Fails only when a revenue or price total leaves the decimal range.
pub fn analyze(view: &SalesView<'_>, include_fulfilment: bool) -> Result<Insights> {
    let records = view.records();
    let monthly = monthly_revenue(records)?;

    let overall_growth_pct = match (monthly.first(), monthly.last()) {
        (Some(first), Some(last)) if monthly.len() > 1 => percent_change(first.value, last.value),
        _ => None,
    };
    let changes = month_over_month(&monthly);
    let recent_growth_pct = changes[changes.len().saturating_sub(RECENT_MONTHS)..].to_vec();

    let status_share_pct = if view.is_empty() {
        Vec::new()
    } else {
        status_shares(records)?
    };
    let cancellation_rate_pct = status_share_pct
        .iter()
        .find(|point| point.key == CANCELLED_STATUS)
        .map(|point| point.value)
        .unwrap_or_default();

    let fulfilment_revenue = if include_fulfilment {
        Some(ranked(
            records,
            |r| r.fulfilment.clone().unwrap_or_default(),
            SalesRecord::revenue,
            "Fulfilment revenue",
        )?)
    } else {
        None
    };

    Ok(Insights {
        monthly_revenue: monthly,
        overall_growth_pct,
        recent_growth_pct,
        status_share_pct,
        cancellation_rate_pct,
        fulfilment_revenue,
        monthly_unit_price: monthly_unit_price(records)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{filter::FilterSelection, sales::SalesTable};
    use chrono::NaiveDate;

    fn sale(month: u32, amount: i64, qty: u64, status: &str) -> SalesRecord {
        SalesRecord::new(
            NaiveDate::from_ymd_opt(2022, month, 15),
            Some(Decimal::from(amount)),
            "Set",
            status,
            "KERALA",
        )
        .with_quantity(Some(qty))
    }

    #[test]
    fn growth_compares_first_and_last_month() {
        let table = SalesTable::from_records(vec![
            sale(4, 100, 1, "Shipped"),
            sale(5, 150, 1, "Shipped"),
            sale(6, 50, 1, "Cancelled"),
            sale(6, 30, 1, "Shipped"),
        ]);
        let insights = analyze(&table.view(), false).expect("analyze");

        assert_eq!(insights.monthly_revenue.len(), 3);
        assert_eq!(insights.monthly_revenue[2].value, Decimal::from(80));
        assert_eq!(insights.overall_growth_pct, Some(Decimal::from(-20)));
        let recent: Vec<Option<Decimal>> =
            insights.recent_growth_pct.iter().map(|p| p.value).collect();
        assert_eq!(recent[0], None);
        assert_eq!(recent[1], Some(Decimal::from(50)));
        assert_eq!(recent[2].map(|d| d.round_dp(2)), Some(Decimal::new(-4667, 2)));
        assert_eq!(insights.cancellation_rate_pct, Decimal::from(25));
        assert!(insights.fulfilment_revenue.is_none());
    }

    #[test]
    fn unit_price_skips_zero_and_missing_quantities() {
        let table = SalesTable::from_records(vec![
            sale(4, 100, 2, "Shipped"),
            sale(4, 300, 3, "Shipped"),
            sale(4, 999, 0, "Shipped"),
            sale(4, 500, 1, "Shipped").with_quantity(None),
        ]);
        let insights = analyze(&table.view(), false).expect("analyze");
        assert_eq!(
            insights.monthly_unit_price,
            vec![SeriesPoint::new("2022-04".to_string(), Decimal::from(75))]
        );
    }

    #[test]
    fn fulfilment_revenue_groups_by_channel() {
        let table = SalesTable::from_records(vec![
            sale(4, 100, 1, "Shipped").with_fulfilment("Merchant"),
            sale(4, 300, 1, "Shipped").with_fulfilment("Amazon"),
            sale(5, 50, 1, "Shipped").with_fulfilment("Merchant"),
        ]);
        let insights = analyze(&table.view(), table.has_fulfilment()).expect("analyze");
        assert_eq!(
            insights.fulfilment_revenue,
            Some(vec![
                SeriesPoint::new("Amazon".to_string(), Decimal::from(300)),
                SeriesPoint::new("Merchant".to_string(), Decimal::from(150)),
            ])
        );
    }

    #[test]
    fn empty_view_yields_empty_insights() {
        let table = SalesTable::from_records(vec![sale(4, 100, 1, "Cancelled")]);
        let view = table.filter(&FilterSelection::all().with_months(["2099-01"]));
        let insights = analyze(&view, false).expect("analyze");
        assert!(insights.monthly_revenue.is_empty());
        assert!(insights.recent_growth_pct.is_empty());
        assert!(insights.status_share_pct.is_empty());
        assert_eq!(insights.overall_growth_pct, None);
        assert_eq!(insights.cancellation_rate_pct, Decimal::ZERO);
    }

    #[test]
    fn monthly_overflow_is_reported() {
        let huge = Decimal::from_scientific("6e28").expect("in range");
        let table = SalesTable::from_records(vec![
            SalesRecord::new(
                NaiveDate::from_ymd_opt(2022, 4, 1),
                Some(huge),
                "Set",
                "Shipped",
                "GOA",
            ),
            SalesRecord::new(
                NaiveDate::from_ymd_opt(2022, 4, 2),
                Some(huge),
                "Set",
                "Shipped",
                "GOA",
            ),
        ]);
        let err = analyze(&table.view(), false).expect_err("month total overflows");
        assert!(err.to_string().contains("Monthly revenue"));
    }
}
