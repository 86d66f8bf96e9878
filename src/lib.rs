//! Backend service for the UW Wildlife community reporting platform.
//!
//! Users submit geotagged wildlife incident reports, browse them by page or
//! recency, search for reports near a point, and post to a discussion board.
//!
//!
//!
//! # General Infrastructure
//! - Single process in front of a single SQLite file
//! - Reports and discussion posts are addressed by random 8-digit public ids
//! - Proximity search scans located reports and ranks them by great-circle
//!   distance within a fixed half mile radius
//! - No report updates: records are created once and only removed by
//!   administrative action outside this service
//!
//!
//!
//! # Notes
//!
//! ## SQLite
//! One writer at a time is plenty here. The store serializes its own writes
//! and the only cross-request coordination this service needs is the
//! duplicate-key check backing id allocation, which SQLite's primary key
//! constraint already provides.
//!
//! ## Id allocation race
//! Two concurrent submissions can both see the same random id as free
//! before either inserts. The insert then fails the unique constraint and
//! the handler retries allocation once. With ~90 million candidate ids this
//! is rare enough that the retry has never been observed outside tests.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run the server (listens on `RUST_PORT`, default 19005).
//! ```sh
//! cargo run
//! ```
use std::time::Duration;

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{compression::CompressionLayer, cors::CorsLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod geo;
pub mod ids;
pub mod routes;
pub mod state;

use routes::{
    create_post_handler, create_report_handler, discussion_page_handler, download_handler,
    health_handler, latest_handler, nearby_handler, post_handler, report_handler,
    reports_page_handler, root_handler,
};
use state::State;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/reports/nearby", get(nearby_handler))
        .route("/reports/get/{report_id}", get(report_handler))
        .route("/reports/page", get(reports_page_handler))
        .route("/reports/latest", get(latest_handler))
        .route("/reports/create", post(create_report_handler))
        .route(
            "/reports/download",
            get(download_handler).layer(CompressionLayer::new()),
        )
        .route("/discussion/get", get(post_handler))
        .route("/discussion/page", get(discussion_page_handler))
        .route("/discussion/create", post(create_post_handler))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
