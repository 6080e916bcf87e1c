//! Route handlers for viewing, renaming and deleting the current user's account.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    auth::{AuthEvent, SessionRegistry, invalidate_auth_cookie},
    photo::delete_user_photos,
    record::{RecordStore, SqliteRecordStore},
    user::{UserId, UserProfile, delete_user, get_user_by_id, update_nickname, validate_nickname},
};

/// The state needed to manage a user's account.
#[derive(Debug, Clone)]
pub struct AccountState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The database connection for users.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The store that owns the user's records.
    pub records: SqliteRecordStore,
    /// The live sessions.
    pub sessions: Arc<SessionRegistry>,
    /// The directory holding uploaded photos.
    pub photo_dir: PathBuf,
}

impl FromRef<AppState> for AccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            db_connection: state.db_connection.clone(),
            records: SqliteRecordStore::new(state.db_connection.clone()),
            sessions: state.sessions.clone(),
            photo_dir: state.photo_dir.clone(),
        }
    }
}

impl FromRef<AccountState> for Key {
    fn from_ref(state: &AccountState) -> Self {
        state.cookie_key.clone()
    }
}

impl AccountState {
    fn connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>, Error> {
        self.db_connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }
}

/// A route handler that responds with the current user's profile.
pub async fn get_account(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<UserProfile>, Error> {
    let connection = state.connection()?;
    let user = get_user_by_id(user_id, &connection)?;

    Ok(Json(UserProfile::from(&user)))
}

/// The body of a nickname change.
#[derive(Debug, Deserialize)]
pub struct NicknameForm {
    /// The new display name.
    pub nickname: String,
}

/// A route handler for changing the current user's nickname.
pub async fn update_nickname_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserId>,
    Json(form): Json<NicknameForm>,
) -> Result<Json<UserProfile>, Error> {
    let nickname = validate_nickname(&form.nickname)?;

    let user = {
        let connection = state.connection()?;
        update_nickname(user_id, &nickname, &connection)?;
        get_user_by_id(user_id, &connection)?
    };

    state.sessions.publish(AuthEvent::ProfileUpdated { user_id });

    Ok(Json(UserProfile::from(&user)))
}

/// A route handler that deletes the current user with their records and photos.
///
/// Every session of the user is ended and the auth cookie is expired.
pub async fn delete_account(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserId>,
    jar: PrivateCookieJar,
) -> Result<(StatusCode, PrivateCookieJar), Error> {
    let record_count = state.records.delete_all(user_id)?;
    let photo_count = delete_user_photos(&state.photo_dir, user_id).await?;
    {
        let connection = state.connection()?;
        delete_user(user_id, &connection)?;
    }

    let session_count = state.sessions.end_all_for_user(user_id);
    state
        .sessions
        .publish(AuthEvent::AccountDeleted { user_id });

    tracing::info!(
        "Deleted user {user_id} with {record_count} records and {photo_count} photos, ending {session_count} sessions"
    );

    Ok((StatusCode::NO_CONTENT, invalidate_auth_cookie(jar)))
}
