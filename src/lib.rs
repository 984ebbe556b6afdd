//! Rate limited Discord bot token checker.
//!
//! Every token route sits behind an [`rate_limit::AdmissionController`] that
//! enforces a minimum gap between accepted requests per client and bans
//! clients that keep ignoring it.

pub mod config;
pub mod discord;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;

use crate::handlers::{api_info_handler, check_token_handler, health_handler, metrics_handler};
use crate::state::AppState;

/// Build the router. Token routes are rate limited, the rest are not.
pub fn app(state: Arc<AppState>) -> Router {
    let guarded = Router::new()
        .route(&state.api.path, get(api_info_handler))
        .route("/check_token", post(check_token_handler))
        .route_layer(from_fn_with_state(state.clone(), middleware::admission));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(guarded)
        .layer(from_fn_with_state(state.clone(), middleware::request_log))
        .with_state(state)
}

/// [`app`] plus static files (index.html at `/`) for every other path.
pub fn app_with_static(state: Arc<AppState>, static_dir: &Path) -> Router {
    app(state).fallback_service(ServeDir::new(static_dir))
}
