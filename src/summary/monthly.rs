//! Per-month totals over a summary period.

use std::collections::HashMap;

use serde::Serialize;
use time::Date;

use crate::{
    record::{Record, RecordKind},
    summary::{MonthKey, SummaryPeriod, normalize_amount},
    timezone::LocalZone,
};

/// The totals of one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthBucket {
    /// The month as "YYYY-MM".
    pub key: MonthKey,
    /// The short name of the month, e.g. "Jan".
    pub label: String,
    /// The sum of the month's expenses.
    pub expense_sum: f64,
    /// The sum of the month's income.
    pub income_sum: f64,
}

/// The totals of every month in a period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    /// The period that was summarised.
    pub period: SummaryPeriod,
    /// One bucket per month in the period, oldest first.
    pub months: Vec<MonthBucket>,
    /// Whether any month has a non-zero total.
    pub has_data: bool,
}

/// Sum the records by month for the `period` containing `today`.
///
/// The output always has one bucket per month of the period, even when no
/// records fall in it.
pub fn build_monthly_buckets(
    records: &[Record],
    period: SummaryPeriod,
    today: Date,
    zone: &LocalZone,
) -> MonthlySummary {
    let mut months: Vec<MonthBucket> = period
        .months(today)
        .into_iter()
        .map(|key| MonthBucket {
            key,
            label: key.label().to_owned(),
            expense_sum: 0.0,
            income_sum: 0.0,
        })
        .collect();
    let index_of: HashMap<MonthKey, usize> = months
        .iter()
        .enumerate()
        .map(|(index, bucket)| (bucket.key, index))
        .collect();

    for record in records {
        let timestamp = record.effective_timestamp();

        if timestamp == 0 {
            continue;
        }

        let Some(date) = zone.date_of(timestamp) else {
            continue;
        };

        let Some(&index) = index_of.get(&MonthKey::of(date)) else {
            continue;
        };

        let amount = normalize_amount(record.amount);
        let bucket = &mut months[index];

        match record.kind {
            RecordKind::Expense => bucket.expense_sum += amount,
            RecordKind::Income => bucket.income_sum += amount,
        }
    }

    let has_data = months
        .iter()
        .any(|bucket| bucket.expense_sum != 0.0 || bucket.income_sum != 0.0);

    MonthlySummary {
        period,
        months,
        has_data,
    }
}
