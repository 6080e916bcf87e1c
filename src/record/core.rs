//! Defines the core data models and database queries for records.

use rusqlite::{Connection, Row, types::Type};
use serde::{Deserialize, Serialize};

use crate::{Error, user::UserId};

// ============================================================================
// MODELS
// ============================================================================

/// The database ID of a record.
pub type RecordId = i64;

/// Whether money was spent or earned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Money that was spent.
    #[serde(alias = "spending")]
    Expense,
    /// Money that was earned.
    Income,
}

impl RecordKind {
    /// The label used to store the kind in the database and in exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Expense => "expense",
            RecordKind::Income => "income",
        }
    }

    /// Parse a stored label.
    ///
    /// Older rows use "spending" for expenses, which is read as [RecordKind::Expense].
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "expense" | "spending" => Some(RecordKind::Expense),
            "income" => Some(RecordKind::Income),
            _ => None,
        }
    }
}

/// One income or expense entry.
///
/// To create a new `Record`, use [Record::build] and pass the builder to a
/// [RecordStore](crate::RecordStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// The ID of the record.
    pub id: RecordId,
    /// Whether the record is an expense or income.
    pub kind: RecordKind,
    /// The amount of money in whole currency units.
    ///
    /// Rows written by this application always hold a whole, non-negative
    /// number, but older rows may hold anything, including NaN.
    pub amount: f64,
    /// A free text description of the record.
    pub note: String,
    /// Epoch milliseconds of the date the user picked, `0` if unset.
    pub occurred_at: i64,
    /// Epoch milliseconds of when the record was stored.
    pub created_at: i64,
    /// Epoch milliseconds of the last change to the record.
    pub updated_at: i64,
    /// The attached photo, if any.
    pub photo_ref: Option<String>,
}

impl Record {
    /// Create a new record.
    ///
    /// Shortcut for [NewRecord] for discoverability.
    pub fn build(kind: RecordKind, amount: f64, note: &str) -> NewRecord {
        NewRecord {
            kind,
            amount,
            note: note.to_owned(),
            occurred_at: 0,
            photo_ref: None,
        }
    }

    /// The timestamp used to place the record in a day or month.
    ///
    /// This is the user-chosen date if set, otherwise the creation time.
    pub fn effective_timestamp(&self) -> i64 {
        if self.occurred_at != 0 {
            self.occurred_at
        } else {
            self.created_at
        }
    }
}

/// The user-editable fields of a [Record].
///
/// The store assigns the ID and the timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    /// Whether the record is an expense or income.
    pub kind: RecordKind,
    /// The amount of money in whole currency units.
    pub amount: f64,
    /// A free text description of the record.
    pub note: String,
    /// Epoch milliseconds of the date the record happened, `0` if unset.
    pub occurred_at: i64,
    /// The attached photo, if any.
    pub photo_ref: Option<String>,
}

impl NewRecord {
    /// Set the date the record happened as epoch milliseconds.
    pub fn occurred_at(mut self, occurred_at: i64) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// Set the attached photo.
    pub fn photo_ref(mut self, photo_ref: Option<String>) -> Self {
        self.photo_ref = photo_ref;
        self
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const RECORD_COLUMNS: &str =
    "id, kind, amount, note, occurred_at, created_at, updated_at, photo_ref";

/// Create the record table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_record_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS record (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                amount REAL,
                note TEXT NOT NULL DEFAULT '',
                occurred_at INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                photo_ref TEXT,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    // Listing is always per user, newest first.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_record_user_created ON record(user_id, created_at);",
        (),
    )?;

    Ok(())
}

/// Insert a record for `user_id`, stamped with `now` as epoch milliseconds.
///
/// An unset `occurred_at` is replaced with `now`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `user_id` does not refer to a registered user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_record(
    user_id: UserId,
    new_record: NewRecord,
    now: i64,
    connection: &Connection,
) -> Result<Record, Error> {
    let occurred_at = if new_record.occurred_at == 0 {
        now
    } else {
        new_record.occurred_at
    };

    connection
        .prepare(&format!(
            "INSERT INTO record (user_id, kind, amount, note, occurred_at, created_at, updated_at, photo_ref)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7)
             RETURNING {RECORD_COLUMNS}"
        ))?
        .query_row(
            (
                user_id.as_i64(),
                new_record.kind.as_str(),
                new_record.amount,
                new_record.note,
                occurred_at,
                now,
                new_record.photo_ref,
            ),
            map_record_row,
        )
        .map_err(|error| match error {
            // The user was deleted while their request was in flight.
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::NotFound,
            error => error.into(),
        })
}

/// Retrieve the record `id` owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a record owned by the user,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_record(user_id: UserId, id: RecordId, connection: &Connection) -> Result<Record, Error> {
    let record = connection
        .prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM record WHERE id = :id AND user_id = :user_id"
        ))?
        .query_row(
            &[(":id", &id), (":user_id", &user_id.as_i64())],
            map_record_row,
        )?;

    Ok(record)
}

/// Get every record owned by `user_id`, most recently created first.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn list_records(user_id: UserId, connection: &Connection) -> Result<Vec<Record>, Error> {
    let mut statement = connection.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM record WHERE user_id = :user_id
         ORDER BY created_at DESC, id DESC"
    ))?;

    let records = statement
        .query_map(&[(":user_id", &user_id.as_i64())], map_record_row)?
        .map(|maybe_record| maybe_record.map_err(Error::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

/// Replace the editable fields of record `id` owned by `user_id`.
///
/// An unset `occurred_at` keeps the stored date.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingRecord] if `id` does not refer to a record owned by the user,
/// - or [Error::SqlError] there is some other SQL error.
pub fn update_record(
    user_id: UserId,
    id: RecordId,
    new_record: NewRecord,
    now: i64,
    connection: &Connection,
) -> Result<Record, Error> {
    connection
        .prepare(&format!(
            "UPDATE record
             SET kind = ?1, amount = ?2, note = ?3,
                 occurred_at = CASE WHEN ?4 = 0 THEN occurred_at ELSE ?4 END,
                 photo_ref = ?5, updated_at = ?6
             WHERE id = ?7 AND user_id = ?8
             RETURNING {RECORD_COLUMNS}"
        ))?
        .query_row(
            (
                new_record.kind.as_str(),
                new_record.amount,
                new_record.note,
                new_record.occurred_at,
                new_record.photo_ref,
                now,
                id,
                user_id.as_i64(),
            ),
            map_record_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UpdateMissingRecord,
            error => error.into(),
        })
}

/// Delete record `id` owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingRecord] if `id` does not refer to a record owned by the user,
/// - or [Error::SqlError] there is some other SQL error.
pub fn delete_record(user_id: UserId, id: RecordId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM record WHERE id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingRecord);
    }

    Ok(())
}

/// Delete every record owned by `user_id`, returning how many were deleted.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn delete_all_records(user_id: UserId, connection: &Connection) -> Result<usize, Error> {
    connection
        .execute(
            "DELETE FROM record WHERE user_id = ?1",
            (user_id.as_i64(),),
        )
        .map_err(Error::from)
}

/// Get the total number of records in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
#[cfg(test)]
pub fn count_records(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM record;", [], |row| row.get(0))
        .map_err(|error| error.into())
}

/// Map a database row to a Record.
pub fn map_record_row(row: &Row) -> Result<Record, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_kind: String = row.get(1)?;
    let kind = RecordKind::from_label(&raw_kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            format!("unknown record kind \"{raw_kind}\"").into(),
        )
    })?;
    // SQLite stores NaN as NULL, so a missing amount is read back as NaN and
    // left for the summaries to treat as zero.
    let amount = row.get::<_, Option<f64>>(2)?.unwrap_or(f64::NAN);
    let note = row.get(3)?;
    let occurred_at = row.get(4)?;
    let created_at = row.get(5)?;
    let updated_at = row.get(6)?;
    let photo_ref = row.get(7)?;

    Ok(Record {
        id,
        kind,
        amount,
        note,
        occurred_at,
        created_at,
        updated_at,
        photo_ref,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        db::initialize,
        record::core::{
            Record, RecordKind, count_records, create_record, delete_all_records, delete_record,
            get_record, list_records, update_record,
        },
        test_utils::create_test_user,
        user::UserId,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn create_succeeds() {
        let conn = get_test_connection();
        let user = create_test_user(&conn);

        let record = create_record(
            user.id,
            Record::build(RecordKind::Expense, 1200.0, "Lunch").occurred_at(1_000),
            5_000,
            &conn,
        )
        .unwrap();

        assert_eq!(record.amount, 1200.0);
        assert_eq!(record.kind, RecordKind::Expense);
        assert_eq!(record.occurred_at, 1_000);
        assert_eq!(record.created_at, 5_000);
        assert_eq!(record.updated_at, 5_000);
    }

    #[test]
    fn create_replaces_unset_date_with_now() {
        let conn = get_test_connection();
        let user = create_test_user(&conn);

        let record = create_record(
            user.id,
            Record::build(RecordKind::Income, 10.0, "Pay"),
            5_000,
            &conn,
        )
        .unwrap();

        assert_eq!(record.occurred_at, 5_000);
    }

    #[test]
    fn create_fails_for_unknown_user() {
        let conn = get_test_connection();

        let result = create_record(
            UserId::new(42),
            Record::build(RecordKind::Income, 10.0, "Pay"),
            5_000,
            &conn,
        );

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn list_returns_newest_created_first() {
        let conn = get_test_connection();
        let user = create_test_user(&conn);
        for (i, created_at) in [3_000, 1_000, 2_000, 2_000].into_iter().enumerate() {
            create_record(
                user.id,
                Record::build(RecordKind::Expense, i as f64, ""),
                created_at,
                &conn,
            )
            .unwrap();
        }

        let records = list_records(user.id, &conn).unwrap();

        let amounts: Vec<f64> = records.iter().map(|record| record.amount).collect();
        assert_eq!(amounts, vec![0.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn records_are_scoped_to_owner() {
        let conn = get_test_connection();
        let owner = create_test_user(&conn);
        let other = crate::test_utils::create_user_named("other", &conn);
        let record = create_record(
            owner.id,
            Record::build(RecordKind::Expense, 5.0, "Mine"),
            1_000,
            &conn,
        )
        .unwrap();

        assert_eq!(list_records(other.id, &conn), Ok(vec![]));
        assert_eq!(get_record(other.id, record.id, &conn), Err(Error::NotFound));
        assert_eq!(
            update_record(
                other.id,
                record.id,
                Record::build(RecordKind::Income, 1.0, "Theirs"),
                2_000,
                &conn
            ),
            Err(Error::UpdateMissingRecord)
        );
        assert_eq!(
            delete_record(other.id, record.id, &conn),
            Err(Error::DeleteMissingRecord)
        );
        assert_eq!(get_record(owner.id, record.id, &conn), Ok(record));
    }

    #[test]
    fn update_stamps_updated_at_and_keeps_unset_date() {
        let conn = get_test_connection();
        let user = create_test_user(&conn);
        let record = create_record(
            user.id,
            Record::build(RecordKind::Expense, 5.0, "Coffee").occurred_at(1_000),
            2_000,
            &conn,
        )
        .unwrap();

        let updated = update_record(
            user.id,
            record.id,
            Record::build(RecordKind::Income, 7.0, "Refund"),
            9_000,
            &conn,
        )
        .unwrap();

        assert_eq!(updated.kind, RecordKind::Income);
        assert_eq!(updated.amount, 7.0);
        assert_eq!(updated.note, "Refund");
        assert_eq!(updated.occurred_at, 1_000);
        assert_eq!(updated.created_at, 2_000);
        assert_eq!(updated.updated_at, 9_000);
    }

    #[test]
    fn delete_removes_record() {
        let conn = get_test_connection();
        let user = create_test_user(&conn);
        let record = create_record(
            user.id,
            Record::build(RecordKind::Expense, 5.0, "Coffee"),
            2_000,
            &conn,
        )
        .unwrap();

        delete_record(user.id, record.id, &conn).unwrap();

        assert_eq!(get_record(user.id, record.id, &conn), Err(Error::NotFound));
    }

    #[test]
    fn delete_all_only_touches_owner() {
        let conn = get_test_connection();
        let owner = create_test_user(&conn);
        let other = crate::test_utils::create_user_named("other", &conn);
        for user_id in [owner.id, owner.id, other.id] {
            create_record(
                user_id,
                Record::build(RecordKind::Expense, 1.0, ""),
                1_000,
                &conn,
            )
            .unwrap();
        }

        assert_eq!(delete_all_records(owner.id, &conn), Ok(2));
        assert_eq!(count_records(&conn), Ok(1));
    }

    #[test]
    fn legacy_rows_are_readable() {
        let conn = get_test_connection();
        let user = create_test_user(&conn);
        conn.execute(
            "INSERT INTO record (user_id, kind, amount, note, occurred_at, created_at, updated_at)
             VALUES (?1, 'spending', NULL, 'old', 0, 1000, 1000)",
            (user.id.as_i64(),),
        )
        .unwrap();

        let records = list_records(user.id, &conn).unwrap();

        assert_eq!(records[0].kind, RecordKind::Expense);
        assert!(records[0].amount.is_nan());
        assert_eq!(records[0].effective_timestamp(), 1000);
    }

    #[test]
    fn kind_labels_deserialize_with_legacy_alias() {
        let kinds: Vec<RecordKind> =
            serde_json::from_str(r#"["expense", "income", "spending"]"#).unwrap();

        assert_eq!(
            kinds,
            vec![RecordKind::Expense, RecordKind::Income, RecordKind::Expense]
        );
    }
}
