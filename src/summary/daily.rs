//! Per-day totals within a month, shaped for a bar chart.

use serde::Serialize;

use crate::{
    record::{Record, RecordKind},
    summary::{CHART_UNIT_DIVISOR, MonthKey, normalize_amount},
    timezone::LocalZone,
};

/// Expense and income per day of a month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyChart {
    /// The day numbers "1" to the last day of the month.
    pub labels: Vec<String>,
    /// `[expense, income]` for each day in [CHART_UNIT_DIVISOR] units.
    pub series: Vec<[f64; 2]>,
    /// Whether any day has a non-zero total.
    pub has_data: bool,
}

/// Sum the records of `month` by local day and kind.
///
/// `records` may contain records from any month, those outside `month` are ignored.
pub fn build_daily_buckets(records: &[Record], month: MonthKey, zone: &LocalZone) -> DailyChart {
    let days_in_month = month.days() as usize;
    let mut expense_by_day = vec![0.0; days_in_month];
    let mut income_by_day = vec![0.0; days_in_month];

    for record in records {
        let timestamp = record.effective_timestamp();

        if timestamp == 0 {
            continue;
        }

        let Some(date) = zone.date_of(timestamp) else {
            continue;
        };

        if MonthKey::of(date) != month {
            continue;
        }

        let index = date.day() as usize - 1;
        let amount = normalize_amount(record.amount);

        match record.kind {
            RecordKind::Expense => expense_by_day[index] += amount,
            RecordKind::Income => income_by_day[index] += amount,
        }
    }

    let labels = (1..=days_in_month).map(|day| day.to_string()).collect();
    let series: Vec<[f64; 2]> = expense_by_day
        .into_iter()
        .zip(income_by_day)
        .map(|(expense, income)| [expense / CHART_UNIT_DIVISOR, income / CHART_UNIT_DIVISOR])
        .collect();
    let has_data = series
        .iter()
        .any(|[expense, income]| *expense != 0.0 || *income != 0.0);

    DailyChart {
        labels,
        series,
        has_data,
    }
}
