//! Defines the route handler for logging out.

use axum::{extract::State, http::StatusCode};
use axum_extra::extract::PrivateCookieJar;

use crate::auth::{
    cookie::{get_token_from_cookies, invalidate_auth_cookie},
    middleware::AuthState,
};

/// Ends the caller's session, if any, and expires the auth cookie.
///
/// Logging out without a valid cookie is not an error.
pub async fn post_log_out(
    State(state): State<AuthState>,
    jar: PrivateCookieJar,
) -> (StatusCode, PrivateCookieJar) {
    if let Ok(token) = get_token_from_cookies(&jar) {
        state.sessions.end(&token.session_id);
    }

    (StatusCode::NO_CONTENT, invalidate_auth_cookie(jar))
}

#[cfg(test)]
mod log_out_tests {
    use std::sync::Arc;

    use axum::{Router, extract::State, http::StatusCode, routing::post};
    use axum_extra::extract::{PrivateCookieJar, cookie::Key};
    use axum_test::TestServer;
    use sha2::{Digest, Sha512};
    use time::Duration;

    use crate::{
        Error,
        auth::{
            SessionRegistry,
            cookie::{COOKIE_TOKEN, sign_in},
            log_out::post_log_out,
            middleware::AuthState,
        },
        endpoints,
        user::UserId,
    };

    const TEST_LOG_IN_ROUTE: &str = "/log_in";

    async fn stub_log_in_route(
        State(state): State<AuthState>,
        jar: PrivateCookieJar,
    ) -> Result<PrivateCookieJar, Error> {
        sign_in(jar, &state.sessions, UserId::new(1), state.cookie_duration)
    }

    fn get_test_server() -> (TestServer, AuthState) {
        let state = AuthState {
            cookie_key: Key::from(&Sha512::digest("42")),
            cookie_duration: Duration::minutes(5),
            sessions: Arc::new(SessionRegistry::new()),
        };
        let app = Router::new()
            .route(endpoints::LOG_OUT, post(post_log_out))
            .route(TEST_LOG_IN_ROUTE, post(stub_log_in_route))
            .with_state(state.clone());

        (
            TestServer::new(app).expect("Could not create test server."),
            state,
        )
    }

    #[tokio::test]
    async fn log_out_ends_session_and_expires_cookie() {
        let (server, state) = get_test_server();
        let token_cookie = server.post(TEST_LOG_IN_ROUTE).await.cookie(COOKIE_TOKEN);
        assert_eq!(state.sessions.len(), 1);

        let response = server
            .post(endpoints::LOG_OUT)
            .add_cookie(token_cookie)
            .await;

        response.assert_status(StatusCode::NO_CONTENT);
        assert!(state.sessions.is_empty());
        assert_eq!(
            response.cookie(COOKIE_TOKEN).max_age(),
            Some(Duration::ZERO)
        );
    }

    #[tokio::test]
    async fn log_out_without_cookie_succeeds() {
        let (server, _) = get_test_server();

        server
            .post(endpoints::LOG_OUT)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }
}
