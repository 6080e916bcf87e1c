//! Account Book is a web service for tracking personal income and expenses.
//!
//! This library provides a JSON API for recording transactions, summarising
//! them by day and month, and managing the authenticated user's account.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod account;
mod app_state;
mod auth;
mod db;
mod endpoints;
mod export;
mod logging;
mod password;
mod photo;
mod record;
mod retention;
mod routing;
mod summary;
mod timezone;
mod user;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use auth::{AuthEvent, SessionId, SessionRegistry, Subscription};
pub use db::initialize as initialize_db;
pub use logging::logging_middleware;
pub use password::{PasswordHash, ValidatedPassword};
pub use record::{NewRecord, Record, RecordId, RecordKind, RecordStore, SqliteRecordStore};
pub use retention::{PurgedRecords, purge_expired_records, spawn_retention_task};
pub use routing::build_router;
pub use summary::{
    DailyChart, DayGroup, MonthBucket, MonthKey, MonthlySummary, SummaryPeriod,
    build_daily_buckets, build_daily_groups, build_monthly_buckets,
};
pub use timezone::LocalZone;
pub use user::{User, UserId, get_user_by_id};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The identifier or password used to log in was wrong.
    ///
    /// Unknown users and wrong passwords are deliberately indistinguishable.
    #[error("invalid email, username or password")]
    InvalidCredentials,

    /// The request has no live session attached to it.
    #[error("you must be logged in to do that")]
    Unauthenticated,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The email address is not of the form `name@domain.tld`.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// The username does not meet the registration rules.
    #[error("invalid username: {0}")]
    InvalidUsername(String),

    /// The nickname does not meet the profile rules.
    #[error("invalid nickname: {0}")]
    InvalidNickname(String),

    /// The email address is already registered.
    #[error("the email address is already in use")]
    DuplicateEmail,

    /// The username is already registered.
    #[error("the username is already in use")]
    DuplicateUsername,

    /// The amount of a record was rejected.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A record was submitted without a note.
    #[error("the note cannot be empty")]
    EmptyNote,

    /// The year and month do not describe a calendar month that can be summarised.
    #[error("{year}-{month} is not a valid month")]
    InvalidMonth {
        /// The requested year.
        year: i32,
        /// The requested 1-based month.
        month: u8,
    },

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Tried to update a record that does not exist or belongs to another user.
    #[error("tried to update a record that is not in the database")]
    UpdateMissingRecord,

    /// Tried to delete a record that does not exist or belongs to another user.
    #[error("tried to delete a record that is not in the database")]
    DeleteMissingRecord,

    /// An export was requested but the user has no records.
    #[error("there are no records to export")]
    NothingToExport,

    /// The CSV export could not be written.
    #[error("could not write CSV: {0}")]
    CsvError(String),

    /// The uploaded photo is not one of the accepted image types.
    #[error("unsupported photo type \"{0}\"")]
    UnsupportedPhotoType(String),

    /// The multipart form could not be parsed.
    #[error("could not parse multipart form: {0}")]
    MultipartError(String),

    /// A photo could not be read from or written to disk.
    #[error("photo storage failed: {0}")]
    PhotoStorageError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.username") =>
            {
                Error::DuplicateUsername
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    /// The HTTP status code a client should see for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials | Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::TooWeak(_)
            | Error::InvalidEmail(_)
            | Error::InvalidUsername(_)
            | Error::InvalidNickname(_)
            | Error::InvalidAmount(_)
            | Error::EmptyNote
            | Error::InvalidMonth { .. }
            | Error::MultipartError(_) => StatusCode::BAD_REQUEST,
            Error::DuplicateEmail | Error::DuplicateUsername => StatusCode::CONFLICT,
            Error::NotFound | Error::UpdateMissingRecord | Error::DeleteMissingRecord => {
                StatusCode::NOT_FOUND
            }
            Error::NothingToExport => StatusCode::UNPROCESSABLE_ENTITY,
            Error::UnsupportedPhotoType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::HashingError(_)
            | Error::CsvError(_)
            | Error::PhotoStorageError(_)
            | Error::SqlError(_)
            | Error::InvalidTimezoneError(_)
            | Error::JSONSerializationError(_)
            | Error::DatabaseLockError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal errors are not intended to be shown to the client.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
