//! Exporting a user's records as a CSV file.

use std::collections::BTreeMap;

use axum::{
    Extension,
    extract::{FromRef, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use time::{Date, macros::format_description};

use crate::{
    AppState, Error,
    record::{Record, RecordStore, SqliteRecordStore},
    summary::normalize_amount,
    timezone::{LocalZone, from_timestamp_millis},
    user::UserId,
};

/// The header row of an export.
pub const EXPORT_COLUMNS: [&str; 6] = ["month", "date", "kind", "amount", "note", "created_at"];

/// The state needed to export records.
#[derive(Debug, Clone)]
pub struct ExportState {
    /// The store that owns the records.
    pub store: SqliteRecordStore,
    /// The timezone that dates are written in.
    pub local_timezone: LocalZone,
}

impl FromRef<AppState> for ExportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: SqliteRecordStore::new(state.db_connection.clone()),
            local_timezone: state.local_timezone,
        }
    }
}

/// A route handler that responds with all of the user's records as a CSV attachment.
///
/// # Errors
///
/// Returns [Error::NothingToExport] if the user has no records.
pub async fn export_records(
    State(state): State<ExportState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Response, Error> {
    let records = state.store.list(user_id)?;
    let csv = write_records_csv(&records, &state.local_timezone)?;
    let file_name = export_file_name(state.local_timezone.today());

    tracing::info!("Exported {} records for user {user_id}", records.len());

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        csv,
    )
        .into_response())
}

/// The name of an export made on `today`, e.g. "account_book_20250131.csv".
pub fn export_file_name(today: Date) -> String {
    format!(
        "account_book_{:04}{:02}{:02}.csv",
        today.year(),
        today.month() as u8,
        today.day()
    )
}

/// Write `records` as CSV, grouped by the month of their effective date.
///
/// Months are written newest first and records keep their given order within
/// a month. Records whose date cannot be represented are left out.
///
/// # Errors
///
/// Returns [Error::NothingToExport] if `records` is empty, or
/// [Error::CsvError] if a row could not be written.
pub fn write_records_csv(records: &[Record], zone: &LocalZone) -> Result<String, Error> {
    if records.is_empty() {
        return Err(Error::NothingToExport);
    }

    let mut months: BTreeMap<(i32, u8), Vec<(Date, &Record)>> = BTreeMap::new();

    for record in records {
        let Some(date) = zone.date_of(record.effective_timestamp()) else {
            tracing::warn!("Skipping record {} with an invalid date", record.id);
            continue;
        };

        months
            .entry((date.year(), date.month() as u8))
            .or_default()
            .push((date, record));
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_COLUMNS).map_err(csv_error)?;

    for ((year, month), rows) in months.iter().rev() {
        let month_label = format!("{year:04}-{month:02}");

        for (date, record) in rows {
            writer
                .write_record([
                    month_label.clone(),
                    format_date(*date)?,
                    record.kind.as_str().to_owned(),
                    normalize_amount(record.amount).to_string(),
                    record.note.clone(),
                    format_created_at(record.created_at, zone)?,
                ])
                .map_err(csv_error)?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| Error::CsvError(error.to_string()))?;

    String::from_utf8(bytes).map_err(|error| Error::CsvError(error.to_string()))
}

fn csv_error(error: csv::Error) -> Error {
    tracing::error!("Could not write CSV row: {error}");
    Error::CsvError(error.to_string())
}

fn format_date(date: Date) -> Result<String, Error> {
    date.format(format_description!("[year]-[month]-[day]"))
        .map_err(|error| Error::CsvError(error.to_string()))
}

fn format_created_at(timestamp_millis: i64, zone: &LocalZone) -> Result<String, Error> {
    let Some(utc) = from_timestamp_millis(timestamp_millis) else {
        return Ok(String::new());
    };

    utc.to_offset(zone.offset_at(utc))
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .map_err(|error| Error::CsvError(error.to_string()))
}

#[cfg(test)]
mod export_tests {
    use time::{
        UtcOffset,
        macros::{date, datetime},
    };

    use crate::{
        Error,
        export::{export_file_name, write_records_csv},
        record::{Record, RecordKind},
        timezone::{LocalZone, to_timestamp_millis},
    };

    fn record(id: i64, kind: RecordKind, amount: f64, note: &str, occurred_at: i64) -> Record {
        Record {
            id,
            kind,
            amount,
            note: note.to_owned(),
            occurred_at,
            created_at: to_timestamp_millis(datetime!(2025-03-01 08:00 UTC)),
            updated_at: 0,
            photo_ref: None,
        }
    }

    fn utc() -> LocalZone {
        LocalZone::Fixed(UtcOffset::UTC)
    }

    #[test]
    fn file_name_uses_date() {
        assert_eq!(
            export_file_name(date!(2025 - 01 - 05)),
            "account_book_20250105.csv"
        );
    }

    #[test]
    fn empty_list_is_an_error() {
        assert_eq!(write_records_csv(&[], &utc()), Err(Error::NothingToExport));
    }

    #[test]
    fn months_are_newest_first_and_keep_store_order() {
        let january = to_timestamp_millis(datetime!(2025-01-20 12:00 UTC));
        let january_early = to_timestamp_millis(datetime!(2025-01-05 12:00 UTC));
        let february = to_timestamp_millis(datetime!(2025-02-10 12:00 UTC));
        let records = vec![
            record(3, RecordKind::Expense, 1200.0, "lunch", january_early),
            record(2, RecordKind::Income, 50000.0, "salary", february),
            record(1, RecordKind::Expense, 800.0, "coffee, milk", january),
        ];

        let csv = write_records_csv(&records, &utc()).unwrap();

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "month,date,kind,amount,note,created_at",
                "2025-02,2025-02-10,income,50000,salary,2025-03-01 08:00:00",
                "2025-01,2025-01-05,expense,1200,lunch,2025-03-01 08:00:00",
                "2025-01,2025-01-20,expense,800,\"coffee, milk\",2025-03-01 08:00:00",
            ]
        );
    }

    #[test]
    fn unset_date_falls_back_to_created_at() {
        let records = vec![record(1, RecordKind::Expense, f64::NAN, "old", 0)];

        let csv = write_records_csv(&records, &utc()).unwrap();

        assert!(
            csv.contains("2025-03,2025-03-01,expense,0,old"),
            "got {csv}"
        );
    }
}
