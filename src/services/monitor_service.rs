use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::db::table::{Table, cell_text};
use crate::forms::builder::truthy;
use crate::server::config::MonitorConfig;

pub const NOT_AVAILABLE: &str = "N/A";

/// Bin count of the dashboard's distribution chart.
pub const HISTOGRAM_BINS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureCount {
    pub code: String,
    pub count: u64,
}

/// One bar of the failures-by-code chart; `percent` is relative to the tallest bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartBar {
    pub label: String,
    pub count: u64,
    pub percent: f64,
}

/// One equal-width bin of a numeric column's distribution, `[start, end)` except the last,
/// which also holds the maximum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub label: String,
    pub count: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total: u64,
    pub active: u64,
    pub failures: u64,
    pub breakdown: Vec<FailureCount>,
    pub chart: Vec<ChartBar>,
    pub last_updated: String,
    pub column_count: usize,
    pub numeric_column_count: usize,
}

pub fn summarize(table: &Table, monitor: &MonitorConfig) -> DashboardSummary {
    let breakdown = failure_breakdown(table, monitor);
    DashboardSummary {
        total: table.len() as u64,
        active: count_active(table, &monitor.active_column),
        failures: breakdown.iter().map(|f| f.count).sum(),
        chart: chart_bars(&breakdown),
        breakdown,
        last_updated: last_updated(table, &monitor.timestamp_column),
        column_count: table.columns.len(),
        numeric_column_count: numeric_columns(table).len(),
    }
}

pub fn count_active(table: &Table, active_column: &str) -> u64 {
    table
        .column_values(active_column)
        .map(|values| values.filter(|v| truthy(v)).count() as u64)
        .unwrap_or(0)
}

fn failure_code(value: &Value, monitor: &MonitorConfig) -> Option<String> {
    cell_text(value).filter(|code| monitor.failure_values.contains(code))
}

/// Counts failing rows per code. Rows whose code is null or outside the failure set are skipped.
/// Ordered by count, largest first, then by code.
pub fn failure_breakdown(table: &Table, monitor: &MonitorConfig) -> Vec<FailureCount> {
    let Some(values) = table.column_values(&monitor.status_column) else {
        return Vec::new();
    };

    let mut counts: HashMap<String, u64> = HashMap::new();
    for code in values.filter_map(|v| failure_code(v, monitor)) {
        *counts.entry(code).or_insert(0) += 1;
    }

    let mut breakdown: Vec<FailureCount> = counts
        .into_iter()
        .map(|(code, count)| FailureCount { code, count })
        .collect();
    breakdown.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.code.cmp(&b.code)));
    breakdown
}

fn percent_of(count: u64, max: u64) -> f64 {
    if max == 0 {
        0.0
    } else {
        (count as f64 / max as f64 * 1000.0).round() / 10.0
    }
}

pub fn chart_bars(breakdown: &[FailureCount]) -> Vec<ChartBar> {
    let max = breakdown.iter().map(|f| f.count).max().unwrap_or(0);
    breakdown
        .iter()
        .map(|f| ChartBar {
            label: f.code.clone(),
            count: f.count,
            percent: percent_of(f.count, max),
        })
        .collect()
}

fn edge_label(edge: f64) -> String {
    if edge.fract() == 0.0 && edge.abs() < 1e15 {
        format!("{edge:.0}")
    } else {
        format!("{edge:.2}")
    }
}

/// Splits the numbers in `column` into `bins` equal-width bins between its minimum and maximum.
///
/// Nulls and non-numeric cells are skipped. No numbers gives no bins; a single distinct value
/// gives one bin holding every row.
pub fn histogram(table: &Table, column: &str, bins: usize) -> Vec<HistogramBin> {
    let values: Vec<f64> = table
        .column_values(column)
        .map(|values| {
            values
                .filter_map(Value::as_f64)
                .filter(|v| v.is_finite())
                .collect()
        })
        .unwrap_or_default();

    let Some(min) = values.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let max = values.iter().copied().fold(min, f64::max);

    let bins = if min == max { 1 } else { bins.max(1) };
    let width = (max - min) / bins as f64;

    let mut counts = vec![0u64; bins];
    for value in &values {
        let index = if width == 0.0 {
            0
        } else {
            (((value - min) / width).floor() as usize).min(bins - 1)
        };
        counts[index] += 1;
    }

    let tallest = counts.iter().copied().max().unwrap_or(0);
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let start = min + width * i as f64;
            let end = if i + 1 == bins { max } else { min + width * (i + 1) as f64 };
            HistogramBin {
                start,
                end,
                label: format!("{} to {}", edge_label(start), edge_label(end)),
                count,
                percent: percent_of(count, tallest),
            }
        })
        .collect()
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f").ok())
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Latest timestamp in `column`, or `"N/A"` when the column is missing or holds no timestamps.
pub fn last_updated(table: &Table, column: &str) -> String {
    table
        .column_values(column)
        .and_then(|values| {
            values
                .filter_map(cell_text)
                .filter_map(|text| parse_timestamp(&text))
                .max()
        })
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Columns whose non-null values are all numbers (and that have at least one).
pub fn numeric_columns(table: &Table) -> Vec<String> {
    table
        .columns
        .iter()
        .enumerate()
        .filter(|(index, _)| {
            let mut seen = false;
            let all_numeric = table.rows.iter().filter_map(|row| row.get(*index)).all(|v| match v {
                Value::Null => true,
                Value::Number(_) => {
                    seen = true;
                    true
                }
                _ => false,
            });
            all_numeric && seen
        })
        .map(|(_, name)| name.clone())
        .collect()
}
