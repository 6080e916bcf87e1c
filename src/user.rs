//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::{Error, PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(i64);

impl UserId {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
///
/// The caller should ensure that `id`, `email` and `username` are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserId,
    /// The email address the user registered with.
    pub email: String,
    /// The name the user logs in with.
    pub username: String,
    /// The display name shown in the app, may be empty.
    pub nickname: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

/// The parts of a [User] that are returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// The user's ID.
    pub id: UserId,
    /// The email address the user registered with.
    pub email: String,
    /// The name the user logs in with.
    pub username: String,
    /// The display name shown in the app.
    pub nickname: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            nickname: user.nickname.clone(),
        }
    }
}

/// The data needed to register a user.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    /// The validated, lower-cased email address.
    pub email: String,
    /// The validated, trimmed username.
    pub username: String,
    /// The trimmed display name, may be empty.
    pub nickname: String,
    /// The hash of the user's password.
    pub password_hash: PasswordHash,
}

/// The most characters, counted as grapheme clusters, a nickname may have.
pub const MAX_NICKNAME_LENGTH: usize = 20;

/// Trim `raw_nickname` and check that it is not empty and not too long.
///
/// # Errors
///
/// Returns an [Error::InvalidNickname] explaining which rule was broken.
pub fn validate_nickname(raw_nickname: &str) -> Result<String, Error> {
    let nickname = raw_nickname.trim();

    if nickname.is_empty() {
        return Err(Error::InvalidNickname(
            "the nickname cannot be empty".to_owned(),
        ));
    }

    if nickname.graphemes(true).count() > MAX_NICKNAME_LENGTH {
        return Err(Error::InvalidNickname(format!(
            "the nickname cannot be longer than {MAX_NICKNAME_LENGTH} characters"
        )));
    }

    Ok(nickname.to_owned())
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                username TEXT NOT NULL UNIQUE,
                nickname TEXT NOT NULL DEFAULT '',
                password TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a:
/// - [Error::DuplicateEmail] if the email address is already registered,
/// - [Error::DuplicateUsername] if the username is already registered,
/// - or [Error::SqlError] if some other SQL related error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (email, username, nickname, password) VALUES (?1, ?2, ?3, ?4)",
        (
            &new_user.email,
            &new_user.username,
            &new_user.nickname,
            new_user.password_hash.as_ref(),
        ),
    )?;

    let id = UserId::new(connection.last_insert_rowid());

    Ok(User {
        id,
        email: new_user.email,
        username: new_user.username,
        nickname: new_user.nickname,
        password_hash: new_user.password_hash,
    })
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(4)?;

    Ok(User {
        id: UserId::new(row.get(0)?),
        email: row.get(1)?,
        username: row.get(2)?,
        nickname: row.get(3)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserId, db_connection: &Connection) -> Result<User, Error> {
    db_connection
        .prepare("SELECT id, email, username, nickname, password FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user registered with `email`, compared case-insensitively.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has the email address.
pub fn get_user_by_email(email: &str, db_connection: &Connection) -> Result<User, Error> {
    db_connection
        .prepare(
            "SELECT id, email, username, nickname, password FROM user WHERE email = :email COLLATE NOCASE",
        )?
        .query_row(&[(":email", &email)], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user registered with `username`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has the username.
pub fn get_user_by_username(username: &str, db_connection: &Connection) -> Result<User, Error> {
    db_connection
        .prepare(
            "SELECT id, email, username, nickname, password FROM user WHERE username = :username",
        )?
        .query_row(&[(":username", &username)], map_user_row)
        .map_err(|error| error.into())
}

/// Check whether `email` is already registered.
pub fn email_exists(email: &str, db_connection: &Connection) -> Result<bool, Error> {
    let found = db_connection
        .query_row(
            "SELECT 1 FROM user WHERE email = ?1 COLLATE NOCASE",
            (email,),
            |_| Ok(()),
        )
        .optional()?;

    Ok(found.is_some())
}

/// Check whether `username` is already registered.
pub fn username_exists(username: &str, db_connection: &Connection) -> Result<bool, Error> {
    let found = db_connection
        .query_row("SELECT 1 FROM user WHERE username = ?1", (username,), |_| {
            Ok(())
        })
        .optional()?;

    Ok(found.is_some())
}

/// Set the nickname of the user with `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if `user_id` does not belong to a registered user.
pub fn update_nickname(
    user_id: UserId,
    nickname: &str,
    db_connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = db_connection.execute(
        "UPDATE user SET nickname = ?1 WHERE id = ?2",
        (nickname, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete the user with `user_id`.
///
/// The user's records are deleted by the foreign key cascade.
///
/// # Errors
///
/// Returns [Error::NotFound] if `user_id` does not belong to a registered user.
pub fn delete_user(user_id: UserId, db_connection: &Connection) -> Result<(), Error> {
    let rows_affected =
        db_connection.execute("DELETE FROM user WHERE id = ?1", (user_id.as_i64(),))?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_users(connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| row.get(0))
        .map_err(|error| error.into())
}
