//! Single-event ticketing/RSVP backend.
//!
//! A public API collects guest info, charges cards through Stripe payment
//! intents, persists RSVP records against an 80-guest cap, and sends
//! confirmation messages; an admin surface lists, edits, refunds, and
//! deletes RSVPs. The webhook event stream is the authoritative writer for
//! completed admissions; see `lifecycle` for the reconciliation rules.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::routing::{get, post};
use axum::{Json, Router};
use migration::{Migrator, MigratorTrait};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod capacity;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod notify;
pub mod state;
pub mod store;
pub mod stripe;
pub mod util;

use config::Config;
use state::{AppState, SharedState};

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::from_env()?;

    info!("Connecting to database...");
    let db = db::connect(&config.database_url).await?;
    Migrator::up(&db, None).await?;

    let state: SharedState = Arc::new(AppState::new(config, db));
    let address = format!("0.0.0.0:{}", state.config.port);

    let app = router(state);

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

pub fn router(state: SharedState) -> Router {
    // The landing page is served from a separate origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health))
        .route("/api/capacity", get(handlers::payments::capacity_status))
        .route(
            "/api/create-payment-intent",
            post(handlers::payments::create_payment_intent),
        )
        .route("/api/webhook", post(handlers::webhook::handle_webhook))
        .route(
            "/api/rsvps",
            get(handlers::rsvps::list_rsvps).post(handlers::rsvps::create_rsvp),
        )
        .route(
            "/api/rsvps/{id}",
            get(handlers::rsvps::get_rsvp)
                .put(handlers::rsvps::update_rsvp)
                .delete(handlers::rsvps::delete_rsvp),
        )
        .route("/api/rsvps/{id}/refund", post(handlers::rsvps::refund_rsvp))
        .route(
            "/api/send-confirmation",
            post(handlers::notifications::send_confirmation),
        )
        .route("/api/send-sms", post(handlers::notifications::send_sms))
        .route("/api/admin/db/ping", get(handlers::admin::handle_db_ping))
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "service": "boatparty",
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
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
