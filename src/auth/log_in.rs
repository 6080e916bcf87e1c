//! Defines the route handler for logging in with an email address or username.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::Deserialize;
use time::Duration;

use crate::{
    AppState, Error,
    auth::{
        SessionRegistry,
        cookie::{REMEMBER_ME_COOKIE_DURATION, sign_in},
    },
    user::{User, UserProfile, get_user_by_email, get_user_by_username},
};

/// The state needed to log in a user.
#[derive(Debug, Clone)]
pub struct LogInState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The live sessions.
    pub sessions: Arc<SessionRegistry>,
    /// The database connection for looking up users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            sessions: state.sessions.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

impl FromRef<LogInState> for Key {
    fn from_ref(state: &LogInState) -> Self {
        state.cookie_key.clone()
    }
}

/// The credentials for logging in.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogInData {
    /// An email address if it contains "@", otherwise a username.
    pub identifier: String,
    /// Password entered during log-in.
    pub password: String,
    /// Whether to keep the user logged in for longer.
    #[serde(default)]
    pub remember_me: bool,
}

/// Handler for log-in requests.
///
/// On success a session is started, the auth cookie is set and the user's
/// profile is returned. Unknown users and wrong passwords both get
/// [Error::InvalidCredentials].
pub async fn post_log_in(
    State(state): State<LogInState>,
    jar: PrivateCookieJar,
    Json(user_data): Json<LogInData>,
) -> Result<(PrivateCookieJar, Json<UserProfile>), Error> {
    let user = find_user(&user_data.identifier, &state.db_connection)?;

    let is_password_valid = user
        .password_hash
        .verify(&user_data.password)
        .map_err(|error| {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            Error::HashingError(error.to_string())
        })?;

    if !is_password_valid {
        tracing::debug!("Wrong password for user {}", user.id);
        return Err(Error::InvalidCredentials);
    }

    let cookie_duration = if user_data.remember_me {
        REMEMBER_ME_COOKIE_DURATION
    } else {
        state.cookie_duration
    };

    let jar = sign_in(jar, &state.sessions, user.id, cookie_duration)?;

    Ok((jar, Json(UserProfile::from(&user))))
}

fn find_user(identifier: &str, db_connection: &Mutex<Connection>) -> Result<User, Error> {
    let identifier = identifier.trim();
    let connection = db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let result = if identifier.contains('@') {
        get_user_by_email(identifier, &connection)
    } else {
        get_user_by_username(identifier, &connection)
    };

    match result {
        Ok(user) => Ok(user),
        Err(Error::NotFound) => Err(Error::InvalidCredentials),
        Err(error) => Err(error),
    }
}
