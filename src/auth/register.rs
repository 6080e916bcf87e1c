//! Defines the route handlers for registering a new user.

use std::sync::{Arc, Mutex, OnceLock};

use axum::{
    Json,
    extract::{FromRef, Query, State},
    http::StatusCode,
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error, PasswordHash, ValidatedPassword,
    auth::{SessionRegistry, cookie::sign_in},
    user::{
        NewUser, UserProfile, create_user, email_exists, username_exists, validate_nickname,
    },
};

/// The fewest characters a username may have.
pub const MIN_USERNAME_LENGTH: usize = 3;

/// The bcrypt cost for new passwords, lowered in tests to keep them fast.
const HASH_COST: u32 = if cfg!(test) {
    4
} else {
    PasswordHash::DEFAULT_COST
};

/// The state needed to register a user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The live sessions.
    pub sessions: Arc<SessionRegistry>,
    /// The database connection for storing users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            sessions: state.sessions.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

impl FromRef<RegistrationState> for Key {
    fn from_ref(state: &RegistrationState) -> Self {
        state.cookie_key.clone()
    }
}

/// The details of a new user.
#[derive(Clone, Debug, Deserialize)]
pub struct RegisterForm {
    /// The email address to register.
    pub email: String,
    /// The name to log in with.
    pub username: String,
    /// The password to log in with.
    pub password: String,
    /// The display name, defaults to the username.
    #[serde(default)]
    pub nickname: Option<String>,
}

/// Handler for registering a new user.
///
/// On success the user is logged in and their profile returned with 201 Created.
pub async fn register_user(
    State(state): State<RegistrationState>,
    jar: PrivateCookieJar,
    Json(form): Json<RegisterForm>,
) -> Result<(StatusCode, PrivateCookieJar, Json<UserProfile>), Error> {
    let email = validate_email(&form.email)?;
    let username = validate_username(&form.username)?;
    let nickname = match form.nickname.as_deref().map(str::trim) {
        Some(nickname) if !nickname.is_empty() => validate_nickname(nickname)?,
        _ => username.clone(),
    };
    let password = ValidatedPassword::new(&form.password)?;
    let password_hash = PasswordHash::new(password, HASH_COST)?;

    let user = {
        let connection = state.db_connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })?;

        if email_exists(&email, &connection)? {
            return Err(Error::DuplicateEmail);
        }

        if username_exists(&username, &connection)? {
            return Err(Error::DuplicateUsername);
        }

        create_user(
            NewUser {
                email,
                username,
                nickname,
                password_hash,
            },
            &connection,
        )?
    };

    tracing::info!("Registered user {}", user.id);

    let jar = sign_in(jar, &state.sessions, user.id, state.cookie_duration)?;

    Ok((StatusCode::CREATED, jar, Json(UserProfile::from(&user))))
}

/// The values to check in an availability query.
#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityQuery {
    /// An email address to check.
    pub email: Option<String>,
    /// A username to check.
    pub username: Option<String>,
}

/// Whether the queried values are free to register, `None` if not queried.
#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    /// Whether the email address is valid and unused.
    pub email_available: Option<bool>,
    /// Whether the username is valid and unused.
    pub username_available: Option<bool>,
}

/// Handler for checking whether an email address or username can still be registered.
pub async fn get_availability(
    State(state): State<RegistrationState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Availability>, Error> {
    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let email_available = match query.email.as_deref().map(validate_email) {
        Some(Ok(email)) => Some(!email_exists(&email, &connection)?),
        Some(Err(_)) => Some(false),
        None => None,
    };
    let username_available = match query.username.as_deref().map(validate_username) {
        Some(Ok(username)) => Some(!username_exists(&username, &connection)?),
        Some(Err(_)) => Some(false),
        None => None,
    };

    Ok(Json(Availability {
        email_available,
        username_available,
    }))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid email regex"))
}

/// Trim and lower-case `raw_email` and check it looks like an email address.
fn validate_email(raw_email: &str) -> Result<String, Error> {
    let email = raw_email.trim().to_lowercase();

    if !email_regex().is_match(&email) {
        return Err(Error::InvalidEmail(email));
    }

    Ok(email)
}

/// Trim `raw_username` and check it can be told apart from an email address.
fn validate_username(raw_username: &str) -> Result<String, Error> {
    let username = raw_username.trim();

    if username.chars().count() < MIN_USERNAME_LENGTH {
        return Err(Error::InvalidUsername(format!(
            "usernames must have at least {MIN_USERNAME_LENGTH} characters"
        )));
    }

    if username.contains('@') || username.contains(char::is_whitespace) {
        return Err(Error::InvalidUsername(
            "usernames cannot contain \"@\" or spaces".to_owned(),
        ));
    }

    Ok(username.to_owned())
}

#[cfg(test)]
mod validation_tests {
    use crate::Error;

    use super::{validate_email, validate_username};

    #[test]
    fn email_is_normalised() {
        assert_eq!(
            validate_email("  Foo@Example.COM "),
            Ok("foo@example.com".to_owned())
        );
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for email in ["", "foo", "foo@", "foo@bar", "@bar.baz", "fo o@bar.baz"] {
            assert!(
                matches!(validate_email(email), Err(Error::InvalidEmail(_))),
                "want {email:?} to be rejected"
            );
        }
    }

    #[test]
    fn username_rules() {
        assert_eq!(validate_username(" saver "), Ok("saver".to_owned()));
        assert!(matches!(
            validate_username("ab"),
            Err(Error::InvalidUsername(_))
        ));
        assert!(matches!(
            validate_username("a@b.c"),
            Err(Error::InvalidUsername(_))
        ));
    }
}

#[cfg(test)]
mod register_tests {
    use std::sync::Arc;

    use axum::{
        Router,
        http::StatusCode,
        routing::{get, post},
    };
    use axum_extra::extract::cookie::Key;
    use axum_test::TestServer;
    use serde_json::json;
    use sha2::{Digest, Sha512};

    use crate::{
        auth::{
            SessionRegistry,
            cookie::{COOKIE_TOKEN, DEFAULT_COOKIE_DURATION},
            register::{RegistrationState, get_availability, register_user},
        },
        endpoints,
        test_utils::get_test_connection_and_user,
        user::{User, count_users},
    };

    fn get_test_server() -> (TestServer, RegistrationState, User) {
        let (db_connection, user) = get_test_connection_and_user();
        let state = RegistrationState {
            cookie_key: Key::from(&Sha512::digest("42")),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            sessions: Arc::new(SessionRegistry::new()),
            db_connection,
        };
        let app = Router::new()
            .route(endpoints::USERS, post(register_user))
            .route(endpoints::USER_AVAILABILITY, get(get_availability))
            .with_state(state.clone());

        (
            TestServer::new(app).expect("Could not create test server."),
            state,
            user,
        )
    }

    #[tokio::test]
    async fn register_creates_user_and_signs_in() {
        let (server, state, _) = get_test_server();

        let response = server
            .post(endpoints::USERS)
            .json(&json!({
                "email": "new@example.com",
                "username": "newbie",
                "password": "averysafeandsecurepassword"
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["email"], "new@example.com");
        assert_eq!(body["nickname"], "newbie");
        let _ = response.cookie(COOKIE_TOKEN);
        assert_eq!(state.sessions.len(), 1);
        assert_eq!(count_users(&state.db_connection.lock().unwrap()), Ok(2));
    }

    #[tokio::test]
    async fn register_rejects_duplicates() {
        let (server, _, user) = get_test_server();

        let duplicate_email = server
            .post(endpoints::USERS)
            .json(&json!({
                "email": user.email.to_uppercase(),
                "username": "someoneelse",
                "password": "averysafeandsecurepassword"
            }))
            .await;
        let duplicate_username = server
            .post(endpoints::USERS)
            .json(&json!({
                "email": "other@example.com",
                "username": user.username,
                "password": "averysafeandsecurepassword"
            }))
            .await;

        duplicate_email.assert_status(StatusCode::CONFLICT);
        duplicate_username.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn register_rejects_weak_password() {
        let (server, state, _) = get_test_server();

        let response = server
            .post(endpoints::USERS)
            .json(&json!({
                "email": "new@example.com",
                "username": "newbie",
                "password": "12345"
            }))
            .await;

        response.assert_status_bad_request();
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn availability_reports_taken_and_invalid_values() {
        let (server, _, user) = get_test_server();

        let response = server
            .get(endpoints::USER_AVAILABILITY)
            .add_query_param("email", &user.email)
            .add_query_param("username", "free_name")
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({"emailAvailable": false, "usernameAvailable": true}));

        let response = server
            .get(endpoints::USER_AVAILABILITY)
            .add_query_param("email", "not-an-email")
            .await;

        response.assert_json(&json!({"emailAvailable": false, "usernameAvailable": null}));
    }
}
