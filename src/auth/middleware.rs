//! Authentication middleware that validates cookies and extends sessions.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use time::{Duration, OffsetDateTime};

use crate::{
    AppState, Error,
    auth::{
        SessionRegistry,
        cookie::{extend_auth_cookie_duration_if_needed, get_token_from_cookies},
    },
};

/// The state needed for the auth middleware
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The live sessions.
    pub sessions: Arc<SessionRegistry>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            sessions: state.sessions.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Middleware function that checks for a valid authorization cookie backed by a live session.
///
/// The user ID and session ID are placed into the request and the request
/// executed normally if the cookie is valid, otherwise a 401 JSON error is
/// returned. The session and cookie expiry slide forward on every request.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserId>` to receive the user ID.
///
/// **Note**: The app state must contain an `axum_extra::extract::cookie::Key` for decrypting and verifying the cookie contents.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(err) => {
            tracing::error!("Error getting cookie jar: {err:?}.");
            return Error::Unauthenticated.into_response();
        }
    };
    let token = match get_token_from_cookies(&jar) {
        Ok(token) => token,
        Err(error) => return error.into_response(),
    };

    match state
        .sessions
        .resolve(&token.session_id, OffsetDateTime::now_utc())
    {
        Some(user_id) if user_id == token.user_id => {}
        Some(user_id) => {
            tracing::warn!(
                "Session {} belongs to user {user_id} but the cookie names user {}.",
                token.session_id,
                token.user_id
            );
            return Error::Unauthenticated.into_response();
        }
        None => return Error::Unauthenticated.into_response(),
    }

    parts.extensions.insert(token.user_id);
    parts.extensions.insert(token.session_id.clone());
    let request = Request::from_parts(parts, body);
    let response = next.run(request).await;

    // The handler may have ended the session, e.g. by logging out.
    if !state.sessions.is_live(&token.session_id) {
        return response;
    }

    let session_id = token.session_id.clone();
    let (jar, token) =
        match extend_auth_cookie_duration_if_needed(jar, token, state.cookie_duration) {
            Ok(updated) => updated,
            Err(err) => {
                tracing::error!("Error extending cookie duration: {err:?}. Rolling back cookie jar.");
                return response;
            }
        };
    state.sessions.extend(&session_id, token.expires_at);

    let (mut parts, body) = response.into_parts();
    for (key, val) in jar.into_response().headers().iter() {
        if key != SET_COOKIE {
            continue;
        }

        parts.headers.append(key, val.to_owned());
    }

    Response::from_parts(parts, body)
}
