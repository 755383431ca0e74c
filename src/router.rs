use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Build the application router with all routes
pub fn build(state: Arc<AppState>) -> Router {
    let max_plan_bytes = state.config.max_plan_bytes;

    Router::new()
        // Switch model catalog
        .route("/api/switch-models", get(handlers::switch_models::list_switch_models))
        .route("/api/switch-models/:name", get(handlers::switch_models::get_switch_model))
        // Topology generation
        .route("/api/diet/validate", post(handlers::diet::validate_plan))
        .route("/api/diet/preview", post(handlers::diet::preview_plan))
        .route("/api/diet/commit", post(handlers::diet::commit_plan))
        // Health check
        .route("/api/health", get(handlers::healthcheck))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_plan_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
