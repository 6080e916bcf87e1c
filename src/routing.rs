//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
};

use crate::{
    AppState, Error,
    account::{delete_account, get_account, update_nickname_endpoint},
    auth::{auth_guard, get_availability, post_log_in, post_log_out, register_user},
    endpoints,
    export::export_records,
    photo::{MAX_PHOTO_SIZE, get_photo, upload_photo},
    record::{
        create_record_endpoint, delete_record_endpoint, get_record_endpoint,
        list_records_endpoint, update_record_endpoint,
    },
    summary::{get_daily_chart, get_daily_groups, get_monthly_summary},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::LOG_IN, post(post_log_in))
        .route(endpoints::LOG_OUT, post(post_log_out))
        .route(endpoints::USERS, post(register_user))
        .route(endpoints::USER_AVAILABILITY, get(get_availability));

    let protected_routes = Router::new()
        .route(
            endpoints::RECORDS,
            get(list_records_endpoint).post(create_record_endpoint),
        )
        .route(endpoints::RECORDS_EXPORT, get(export_records))
        .route(
            endpoints::RECORD,
            get(get_record_endpoint)
                .put(update_record_endpoint)
                .delete(delete_record_endpoint),
        )
        .route(endpoints::SUMMARY_DAILY, get(get_daily_chart))
        .route(endpoints::SUMMARY_DAYS, get(get_daily_groups))
        .route(endpoints::SUMMARY_MONTHLY, get(get_monthly_summary))
        .route(endpoints::ACCOUNT, get(get_account).delete(delete_account))
        .route(endpoints::ACCOUNT_NICKNAME, put(update_nickname_endpoint))
        .route(
            endpoints::PHOTOS,
            post(upload_photo).layer(DefaultBodyLimit::max(MAX_PHOTO_SIZE)),
        )
        .route(endpoints::PHOTO, get(get_photo))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}

#[cfg(test)]
mod routing_tests {
    use axum::http::StatusCode;
    use cookie::CookieJar;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use time::macros::datetime;

    use crate::{
        AppState, build_router,
        endpoints::{self, format_endpoint},
        timezone::to_timestamp_millis,
    };

    const PASSWORD: &str = "averysafeandsecurepassword";

    fn get_test_server() -> (TestServer, AppState, TempDir) {
        let photo_dir = tempfile::tempdir().unwrap();
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            "foobar",
            "Etc/UTC",
            photo_dir.path(),
        )
        .unwrap();
        let server =
            TestServer::new(build_router(state.clone())).expect("Could not create test server.");

        (server, state, photo_dir)
    }

    async fn register(server: &TestServer, username: &str) -> CookieJar {
        let response = server
            .post(endpoints::USERS)
            .json(&json!({
                "email": format!("{username}@example.com"),
                "username": username,
                "password": PASSWORD,
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        response.cookies()
    }

    async fn create_record(server: &TestServer, jar: &CookieJar, body: Value) -> Value {
        let response = server
            .post(endpoints::RECORDS)
            .add_cookies(jar.clone())
            .json(&body)
            .await;

        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    #[tokio::test]
    async fn protected_routes_need_a_session() {
        let (server, _, _dir) = get_test_server();

        for endpoint in [
            endpoints::RECORDS,
            endpoints::RECORDS_EXPORT,
            endpoints::SUMMARY_DAILY,
            endpoints::SUMMARY_MONTHLY,
            endpoints::ACCOUNT,
        ] {
            server.get(endpoint).await.assert_status_unauthorized();
        }
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let (server, _, _dir) = get_test_server();

        let response = server.get("/api/nothing_here").await;

        response.assert_status_not_found();
        let body: Value = response.json();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn record_crud_flow() {
        let (server, _, _dir) = get_test_server();
        let jar = register(&server, "saver").await;

        let created = create_record(
            &server,
            &jar,
            json!({"kind": "expense", "amount": 1200, "note": "lunch"}),
        )
        .await;
        let record_path = format_endpoint(endpoints::RECORD, created["id"].as_i64().unwrap());

        server
            .put(&record_path)
            .add_cookies(jar.clone())
            .json(&json!({"kind": "income", "amount": 3000, "note": "refund"}))
            .await
            .assert_status_ok();

        let response = server.get(&record_path).add_cookies(jar.clone()).await;
        response.assert_status_ok();
        let record: Value = response.json();
        assert_eq!(record["kind"], "income");
        assert_eq!(record["note"], "refund");
        assert_eq!(record["occurredAt"], created["occurredAt"]);

        server
            .delete(&record_path)
            .add_cookies(jar.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let records: Vec<Value> = server.get(endpoints::RECORDS).add_cookies(jar).await.json();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn invalid_record_is_rejected() {
        let (server, _, _dir) = get_test_server();
        let jar = register(&server, "saver").await;

        for body in [
            json!({"kind": "expense", "amount": 0, "note": "free"}),
            json!({"kind": "expense", "amount": 12.5, "note": "fraction"}),
            json!({"kind": "expense", "amount": 100, "note": "   "}),
        ] {
            server
                .post(endpoints::RECORDS)
                .add_cookies(jar.clone())
                .json(&body)
                .await
                .assert_status_bad_request();
        }
    }

    #[tokio::test]
    async fn users_cannot_see_each_others_records() {
        let (server, _, _dir) = get_test_server();
        let owner = register(&server, "owner").await;
        let other = register(&server, "other").await;
        let created = create_record(
            &server,
            &owner,
            json!({"kind": "expense", "amount": 100, "note": "mine"}),
        )
        .await;
        let record_path = format_endpoint(endpoints::RECORD, created["id"].as_i64().unwrap());

        server
            .get(&record_path)
            .add_cookies(other.clone())
            .await
            .assert_status_not_found();
        server
            .delete(&record_path)
            .add_cookies(other.clone())
            .await
            .assert_status_not_found();
        let records: Vec<Value> = server.get(endpoints::RECORDS).add_cookies(other).await.json();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn summaries_reflect_records() {
        let (server, _, _dir) = get_test_server();
        let jar = register(&server, "saver").await;
        let jan_5 = to_timestamp_millis(datetime!(2025-01-05 12:00 UTC));
        let jan_20 = to_timestamp_millis(datetime!(2025-01-20 12:00 UTC));
        create_record(
            &server,
            &jar,
            json!({"kind": "expense", "amount": 1200, "note": "lunch", "occurredAt": jan_5}),
        )
        .await;
        create_record(
            &server,
            &jar,
            json!({"kind": "income", "amount": 50000, "note": "salary", "occurredAt": jan_20}),
        )
        .await;

        let chart: Value = server
            .get(endpoints::SUMMARY_DAILY)
            .add_query_param("year", 2025)
            .add_query_param("month", 1)
            .add_cookies(jar.clone())
            .await
            .json();
        assert_eq!(chart["labels"].as_array().unwrap().len(), 31);
        assert_eq!(chart["series"][4], json!([1.2, 0.0]));
        assert_eq!(chart["series"][19], json!([0.0, 50.0]));
        assert_eq!(chart["hasData"], true);

        let days: Vec<Value> = server
            .get(endpoints::SUMMARY_DAYS)
            .add_query_param("year", 2025)
            .add_query_param("month", 1)
            .add_cookies(jar.clone())
            .await
            .json();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0]["totalIncome"], 50000.0);
        assert_eq!(days[1]["totalExpense"], 1200.0);

        server
            .get(endpoints::SUMMARY_DAILY)
            .add_query_param("year", 2025)
            .add_query_param("month", 13)
            .add_cookies(jar.clone())
            .await
            .assert_status_bad_request();

        let monthly: Value = server
            .get(endpoints::SUMMARY_MONTHLY)
            .add_query_param("period", "1y")
            .add_cookies(jar)
            .await
            .json();
        assert_eq!(monthly["months"].as_array().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn export_downloads_csv() {
        let (server, _, _dir) = get_test_server();
        let jar = register(&server, "saver").await;

        server
            .get(endpoints::RECORDS_EXPORT)
            .add_cookies(jar.clone())
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

        create_record(
            &server,
            &jar,
            json!({"kind": "expense", "amount": 1200, "note": "lunch"}),
        )
        .await;
        let response = server.get(endpoints::RECORDS_EXPORT).add_cookies(jar).await;

        response.assert_status_ok();
        let disposition = response.header("content-disposition");
        let disposition = disposition.to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"account_book_"));
        assert!(response.text().starts_with("month,date,kind,amount,note,created_at"));
    }

    #[tokio::test]
    async fn log_out_then_log_in_again() {
        let (server, state, _dir) = get_test_server();
        let jar = register(&server, "saver").await;

        server
            .post(endpoints::LOG_OUT)
            .add_cookies(jar.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(endpoints::ACCOUNT)
            .add_cookies(jar)
            .await
            .assert_status_unauthorized();
        assert!(state.sessions.is_empty());

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({"identifier": "SAVER@example.com", "password": PASSWORD}))
            .await;
        response.assert_status_ok();

        let account: Value = server
            .get(endpoints::ACCOUNT)
            .add_cookies(response.cookies())
            .await
            .json();
        assert_eq!(account["username"], "saver");
    }

    #[tokio::test]
    async fn deleting_account_ends_sessions_and_data() {
        let (server, _, _dir) = get_test_server();
        let jar = register(&server, "saver").await;
        create_record(
            &server,
            &jar,
            json!({"kind": "expense", "amount": 1200, "note": "lunch"}),
        )
        .await;

        server
            .delete(endpoints::ACCOUNT)
            .add_cookies(jar.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .get(endpoints::RECORDS)
            .add_cookies(jar)
            .await
            .assert_status_unauthorized();
        server
            .post(endpoints::LOG_IN)
            .json(&json!({"identifier": "saver", "password": PASSWORD}))
            .await
            .assert_status_unauthorized();
    }

    #[tokio::test]
    async fn availability_is_public() {
        let (server, _, _dir) = get_test_server();
        register(&server, "saver").await;

        let response = server
            .get(endpoints::USER_AVAILABILITY)
            .add_query_param("username", "saver")
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({"emailAvailable": null, "usernameAvailable": false}));
    }
}
