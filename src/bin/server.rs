use std::{
    error::Error,
    fs::OpenOptions,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use paywatch_rs::{
    AppState, DashboardConfig, HashedFraudPolicy, PaginationConfig, build_router,
    get_local_offset, graceful_shutdown, logging_middleware,
};

/// The JSON API server for the paywatch transaction ledger.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The canonical name of the timezone used to group transactions by day,
    /// e.g. "Asia/Kolkata".
    #[arg(long, default_value = "Etc/UTC")]
    timezone: String,

    /// The default number of days in the dashboard's daily series.
    #[arg(long, default_value_t = 7)]
    dashboard_window_days: u32,

    /// The default number of recent transactions on the dashboard.
    #[arg(long, default_value_t = 10)]
    dashboard_recent_limit: u32,

    /// How long the dashboard queries may take, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    dashboard_timeout_ms: u64,

    /// The number of transactions per page when a request does not say.
    #[arg(long, default_value_t = 10)]
    page_size: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_logging()?;

    let args = Args::parse();

    if get_local_offset(&args.timezone).is_none() {
        return Err(format!("unknown timezone \"{}\"", args.timezone).into());
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let dashboard_config = DashboardConfig {
        window_days: args.dashboard_window_days,
        recent_limit: args.dashboard_recent_limit,
        timeout: Duration::from_millis(args.dashboard_timeout_ms),
    };
    dashboard_config.validate()?;

    let conn = Connection::open(&args.db_path)?;
    let pagination_config = PaginationConfig {
        default_page_size: args.page_size,
        ..Default::default()
    };
    let state = AppState::new(
        conn,
        &args.timezone,
        dashboard_config,
        pagination_config,
        Arc::new(HashedFraudPolicy::default()),
    )?;

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = build_router(state).layer(middleware::from_fn(logging_middleware));
    let router = add_tracing_layer(router);

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}

fn setup_logging() -> Result<(), Box<dyn Error>> {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")?;

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file))
        .with_filter(filter::LevelFilter::DEBUG);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "paywatch_rs=info,server=info,tower_http=info".into());

    tracing_subscriber::registry()
        .with(stdout_log.with_filter(env_filter))
        .with(debug_log)
        .init();

    Ok(())
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
        // Errors are logged where they happen.
        .on_failure(());

    router.layer(tracing_layer)
}
