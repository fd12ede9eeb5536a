//! Admin HTTP API.
//!
//! # Routes
//! - `GET /status`: refresh controller status
//! - `GET /config`: the active snapshot
//! - `GET /config/{key}`: one value by dotted key
//! - `POST /refresh`: run a refresh cycle now

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::lifecycle::Shutdown;
use self::handlers::*;

pub use self::handlers::AdminState;

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/config", get(get_config))
        .route("/config/{key}", get(get_key))
        .route("/refresh", post(post_refresh))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until shutdown.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    shutdown: Shutdown,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.signalled())
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
