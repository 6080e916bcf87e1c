use std::{
    env,
    fs::OpenOptions,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use time::OffsetDateTime;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use account_book::{
    AppState, AuthEvent, build_router, graceful_shutdown, logging_middleware,
    spawn_retention_task,
};

/// The JSON API server for account_book.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The canonical timezone that days and months are counted in, e.g. "Asia/Seoul".
    #[arg(long, default_value = "Etc/UTC")]
    timezone: String,

    /// The directory uploaded photos are stored in.
    #[arg(long, default_value = "photos")]
    photo_dir: PathBuf,

    /// Delete records older than this many days, 0 keeps records forever.
    #[arg(long, default_value_t = 365)]
    retention_days: u32,

    /// File path of the debug log.
    #[arg(long, default_value = "debug.log")]
    log_path: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    setup_logging(&args.log_path);

    let secret = env::var("SECRET").expect("The environment variable 'SECRET' must be set");

    let conn = Connection::open(&args.db_path).expect("Could not open the database");
    let state = AppState::new(conn, &secret, &args.timezone, args.photo_dir)
        .expect("Could not create the app state");

    state.sessions.subscribe(log_auth_event);
    spawn_session_pruning(&state);
    spawn_retention_task(
        state.db_connection.clone(),
        state.photo_dir.clone(),
        args.retention_days,
    );

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = build_router(state).layer(middleware::from_fn(logging_middleware));
    let router = add_tracing_layer(router);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("The server stopped unexpectedly");
}

fn setup_logging(log_path: &Path) {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(filter::LevelFilter::INFO);

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file))
        .with_filter(filter::LevelFilter::DEBUG);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_log)
        .with(debug_log)
        .init();
}

fn log_auth_event(event: &AuthEvent) {
    match event {
        AuthEvent::SignedIn {
            user_id,
            session_id,
        } => tracing::info!("User {user_id} signed in with session {session_id}"),
        AuthEvent::SignedOut {
            user_id,
            session_id,
        } => tracing::info!("User {user_id} signed out of session {session_id}"),
        AuthEvent::ProfileUpdated { user_id } => {
            tracing::info!("User {user_id} updated their profile")
        }
        AuthEvent::AccountDeleted { user_id } => {
            tracing::info!("User {user_id} deleted their account")
        }
    }
}

/// Drop expired sessions every few minutes so the registry does not grow without bound.
fn spawn_session_pruning(state: &AppState) {
    let sessions = state.sessions.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(5 * 60));

        loop {
            interval.tick().await;
            let pruned = sessions.prune_expired(OffsetDateTime::now_utc());

            if pruned > 0 {
                tracing::debug!("Pruned {pruned} expired sessions");
            }
        }
    });
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
