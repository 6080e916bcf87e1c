//! Defines functions for handling user authentication with cookies.

use std::cmp::max;

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    auth::{SessionRegistry, Token},
    user::UserId,
};

/// The name of the cookie that holds the auth [Token].
pub const COOKIE_TOKEN: &str = "auth_token";
/// The default duration for which auth cookies are valid.
pub const DEFAULT_COOKIE_DURATION: Duration = Duration::minutes(30);
/// How long an auth cookie lasts when the user asks to be remembered.
pub const REMEMBER_ME_COOKIE_DURATION: Duration = Duration::days(7);

/// Start a session for `user_id` and add its auth cookie to `jar`.
///
/// The session and the cookie both expire `duration` from now.
///
/// # Errors
///
/// Returns an [Error::JSONSerializationError] if the token cannot be
/// serialized, in which case the session is ended again.
pub fn sign_in(
    jar: PrivateCookieJar,
    sessions: &SessionRegistry,
    user_id: UserId,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let expires_at = OffsetDateTime::now_utc() + duration;
    let session_id = sessions.start(user_id, expires_at);
    let token = Token {
        session_id,
        user_id,
        expires_at,
    };

    set_auth_cookie(jar, &token).inspect_err(|_| {
        sessions.end(&token.session_id);
    })
}

/// Add an auth cookie holding `token` to the cookie jar.
///
/// Returns the cookie jar with the cookie added.
///
/// # Errors
///
/// Returns an [Error::JSONSerializationError] if the token cannot be serialized.
pub fn set_auth_cookie(jar: PrivateCookieJar, token: &Token) -> Result<PrivateCookieJar, Error> {
    let token_string = serde_json::to_string(token)
        .map_err(|error| Error::JSONSerializationError(error.to_string()))?;

    Ok(jar.add(
        Cookie::build((COOKIE_TOKEN, token_string))
            .path("/")
            .expires(token.expires_at)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    ))
}

/// Set the auth cookie to an invalid value and set its max age to zero, which should delete the cookie on the client side.
pub fn invalidate_auth_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_TOKEN, "deleted"))
            .path("/")
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Read the auth token from `jar`.
///
/// # Errors
///
/// Returns [Error::Unauthenticated] if the cookie is missing, cannot be
/// parsed or has expired.
pub fn get_token_from_cookies(jar: &PrivateCookieJar) -> Result<Token, Error> {
    let cookie = jar.get(COOKIE_TOKEN).ok_or(Error::Unauthenticated)?;
    let token: Token =
        serde_json::from_str(cookie.value_trimmed()).map_err(|_| Error::Unauthenticated)?;

    if token.expires_at <= OffsetDateTime::now_utc() {
        return Err(Error::Unauthenticated);
    }

    Ok(token)
}

/// Set the expiry of `token` to the latest of UTC now plus `duration` and
/// its current expiry, and store it in `jar`.
///
/// # Errors
///
/// The cookie jar is not modified if an error is returned.
///
/// Returns an [Error::JSONSerializationError] if the token cannot be serialized.
pub fn extend_auth_cookie_duration_if_needed(
    jar: PrivateCookieJar,
    mut token: Token,
    duration: Duration,
) -> Result<(PrivateCookieJar, Token), Error> {
    let new_expiry = OffsetDateTime::now_utc().saturating_add(duration);
    token.expires_at = max(token.expires_at, new_expiry);

    let jar = set_auth_cookie(jar, &token)?;

    Ok((jar, token))
}
