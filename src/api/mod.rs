//! HTTP trigger surface.

pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};

pub use handlers::AppState;

/// Build the HTTP routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // On-demand run
        .route(
            "/fetch",
            get(handlers::fetch_from_query).post(handlers::fetch_from_body),
        )
        .with_state(state)
}
