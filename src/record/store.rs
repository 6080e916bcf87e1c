//! Defines the record store trait and its SQLite implementation.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::FromRef;
use rusqlite::Connection;

use crate::{
    AppState, Error,
    record::core::{
        NewRecord, Record, RecordId, create_record, delete_all_records, delete_record, get_record,
        list_records, update_record,
    },
    timezone::now_millis,
    user::UserId,
};

/// Handles the creation and retrieval of records.
///
/// Every operation is scoped to a single user, other users' records behave as
/// if they do not exist.
pub trait RecordStore {
    /// Get the user's records, most recently created first.
    fn list(&self, user_id: UserId) -> Result<Vec<Record>, Error>;

    /// Store a new record, stamping its creation time.
    fn create(&self, user_id: UserId, new_record: NewRecord) -> Result<Record, Error>;

    /// Retrieve one of the user's records.
    fn get(&self, user_id: UserId, id: RecordId) -> Result<Record, Error>;

    /// Replace the editable fields of one of the user's records.
    fn update(&self, user_id: UserId, id: RecordId, new_record: NewRecord)
    -> Result<Record, Error>;

    /// Delete one of the user's records.
    fn delete(&self, user_id: UserId, id: RecordId) -> Result<(), Error>;

    /// Delete all of the user's records, returning how many were deleted.
    fn delete_all(&self, user_id: UserId) -> Result<usize, Error>;
}

/// Stores records in a SQLite database.
///
/// Note that because a record depends on the [User](crate::User) model, the
/// user table must be set up in the database.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }
}

impl RecordStore for SqliteRecordStore {
    fn list(&self, user_id: UserId) -> Result<Vec<Record>, Error> {
        let connection = self.lock()?;
        list_records(user_id, &connection)
    }

    /// Create a new record in the database.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `user_id` does not refer to a registered user,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn create(&self, user_id: UserId, new_record: NewRecord) -> Result<Record, Error> {
        let connection = self.lock()?;
        create_record(user_id, new_record, now_millis(), &connection)
    }

    fn get(&self, user_id: UserId, id: RecordId) -> Result<Record, Error> {
        let connection = self.lock()?;
        get_record(user_id, id, &connection)
    }

    /// Update a record in the database.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::UpdateMissingRecord] if `id` does not refer to one of the user's records,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn update(
        &self,
        user_id: UserId,
        id: RecordId,
        new_record: NewRecord,
    ) -> Result<Record, Error> {
        let connection = self.lock()?;
        update_record(user_id, id, new_record, now_millis(), &connection)
    }

    /// Delete a record in the database.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::DeleteMissingRecord] if `id` does not refer to one of the user's records,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn delete(&self, user_id: UserId, id: RecordId) -> Result<(), Error> {
        let connection = self.lock()?;
        delete_record(user_id, id, &connection)
    }

    fn delete_all(&self, user_id: UserId) -> Result<usize, Error> {
        let connection = self.lock()?;
        delete_all_records(user_id, &connection)
    }
}

/// The state needed by the record endpoints.
#[derive(Debug, Clone)]
pub struct RecordState {
    /// The store that owns the records.
    pub store: SqliteRecordStore,
}

impl FromRef<AppState> for RecordState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: SqliteRecordStore::new(state.db_connection.clone()),
        }
    }
}
