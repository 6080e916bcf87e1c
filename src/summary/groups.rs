//! Records grouped by local day within a month, shaped for a list view.

use std::collections::BTreeMap;

use serde::Serialize;
use time::Date;

use crate::{
    record::{Record, RecordKind},
    summary::{MonthKey, normalize_amount},
    timezone::LocalZone,
};

/// The records of one day together with their totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayGroup {
    /// A stable key for the group, the day timestamp as a string.
    pub key: String,
    /// Epoch milliseconds of local midnight at the start of the day.
    pub day_timestamp: i64,
    /// The sum of the day's expenses.
    pub total_expense: f64,
    /// The sum of the day's income.
    pub total_income: f64,
    /// The day's records in the order they were given.
    pub items: Vec<Record>,
}

/// Group the records of `month` by local day, most recent day first.
///
/// Records keep their relative order inside a day. Records without a usable
/// date are left out entirely.
pub fn build_daily_groups(records: &[Record], month: MonthKey, zone: &LocalZone) -> Vec<DayGroup> {
    let mut groups: BTreeMap<Date, DayGroup> = BTreeMap::new();

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

        let group = groups.entry(date).or_insert_with(|| {
            let day_timestamp = zone.midnight_millis(date);

            DayGroup {
                key: day_timestamp.to_string(),
                day_timestamp,
                total_expense: 0.0,
                total_income: 0.0,
                items: Vec::new(),
            }
        });

        let amount = normalize_amount(record.amount);

        match record.kind {
            RecordKind::Expense => group.total_expense += amount,
            RecordKind::Income => group.total_income += amount,
        }

        group.items.push(record.clone());
    }

    groups.into_values().rev().collect()
}
