//! Text rendering of query results.
//!
//! KPIs follow dashboard card conventions: currency rounded to whole units
//! with thousands separators (`$1,235`), counts grouped the same way. Series are
//! laid out as aligned plain-text tables; callers wanting machine-readable
//! output serialize the result structs as JSON instead.

use std::borrow::Cow;
use std::fmt::Write as _;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    aggregate::{AggregateResult, SeriesPoint},
    insights::Insights,
    sales::FilterOptions,
};

const STATUS_SHARE_ROWS: usize = 5;

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// `$1,235`: whole units, banker's rounding, grouped thousands.
pub fn format_currency(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let digits = rounded.abs().trunc().to_string();
    format!("{sign}${}", group_thousands(&digits))
}

pub fn format_count(value: usize) -> String {
    group_thousands(&value.to_string())
}

/// Two decimal places, trailing zeros kept.
pub fn format_amount(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn format_percent(value: Option<Decimal>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v.round_dp(2)),
        None => "-".to_string(),
    }
}

pub fn kpi_rows(result: &AggregateResult) -> Vec<Vec<String>> {
    vec![
        vec![
            "Total Revenue".to_string(),
            format_currency(result.total_revenue),
        ],
        vec!["Total Orders".to_string(), format_count(result.total_orders)],
        vec![
            "Avg Order Value".to_string(),
            format_currency(result.avg_order_value),
        ],
        vec!["Top Category".to_string(), result.top_category.clone()],
    ]
}

fn series_rows<K, V>(
    points: &[SeriesPoint<K, V>],
    key: impl Fn(&K) -> String,
    value: impl Fn(&V) -> String,
) -> Vec<Vec<String>> {
    points
        .iter()
        .map(|point| vec![key(&point.key), value(&point.value)])
        .collect()
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn section(output: &mut String, title: &str, header: &[&str], rows: &[Vec<String>]) {
    let _ = writeln!(output, "\n{title}");
    if rows.is_empty() {
        let _ = writeln!(output, "(no data)");
    } else {
        output.push_str(&render_table(&headers(header), rows));
    }
}

/// The full dashboard for one query: KPI block then the four series.
pub fn render_dashboard(result: &AggregateResult) -> String {
    let mut output = render_table(&headers(&["metric", "value"]), &kpi_rows(result));
    section(
        &mut output,
        "Daily Sales Trend",
        &["date", "revenue"],
        &series_rows(
            &result.daily_revenue,
            |d| d.format("%Y-%m-%d").to_string(),
            |v| format_amount(*v),
        ),
    );
    section(
        &mut output,
        "Sales by Category",
        &["category", "revenue"],
        &series_rows(&result.category_revenue, String::clone, |v| {
            format_amount(*v)
        }),
    );
    section(
        &mut output,
        "Order Status Distribution",
        &["status", "orders"],
        &series_rows(&result.status_distribution, String::clone, |v| {
            format_count(*v)
        }),
    );
    section(
        &mut output,
        "Top Regions by Revenue",
        &["region", "revenue"],
        &series_rows(&result.top_regions, String::clone, |v| format_amount(*v)),
    );
    output
}

pub fn render_insights(insights: &Insights) -> String {
    let mut output = String::new();
    section(
        &mut output,
        "Monthly Sales",
        &["month", "revenue"],
        &series_rows(&insights.monthly_revenue, String::clone, |v| {
            format_amount(*v)
        }),
    );
    let _ = writeln!(
        output,
        "\nOverall Growth: {}",
        format_percent(insights.overall_growth_pct)
    );
    section(
        &mut output,
        "Recent Month-over-Month Growth",
        &["month", "growth"],
        &series_rows(&insights.recent_growth_pct, String::clone, |v| {
            format_percent(*v)
        }),
    );
    let shown = insights.status_share_pct.len().min(STATUS_SHARE_ROWS);
    let shares = &insights.status_share_pct[..shown];
    section(
        &mut output,
        "Status Distribution",
        &["status", "share"],
        &series_rows(shares, String::clone, |v| format_percent(Some(*v))),
    );
    let _ = writeln!(
        output,
        "\nCancellation Rate: {}",
        format_percent(Some(insights.cancellation_rate_pct))
    );
    match &insights.fulfilment_revenue {
        Some(channels) => section(
            &mut output,
            "Fulfilment Analysis",
            &["channel", "revenue"],
            &series_rows(channels, String::clone, |v| format_amount(*v)),
        ),
        None => {
            let _ = writeln!(output, "\nFulfilment Analysis\nColumn not found");
        }
    }
    section(
        &mut output,
        "Monthly Avg Price per Unit",
        &["month", "unit price"],
        &series_rows(&insights.monthly_unit_price, String::clone, |v| {
            format_amount(*v)
        }),
    );
    output
}

pub fn render_filter_options(options: &FilterOptions) -> String {
    let rows = [
        ("month", &options.months),
        ("category", &options.categories),
        ("region", &options.regions),
    ]
    .iter()
    .flat_map(|(dimension, values)| {
        values
            .iter()
            .map(move |value| vec![dimension.to_string(), value.clone()])
    })
    .collect::<Vec<_>>();
    render_table(&headers(&["dimension", "value"]), &rows)
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths
        .iter()
        .map(|w| "-".repeat((*w).max(3)))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let sanitized = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&sanitized));
            format!("{sanitized}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
