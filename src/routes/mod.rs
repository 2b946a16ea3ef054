pub mod cors;
pub mod genimage;
pub mod health;
pub mod metrics;

use axum::routing::{any, get};
use axum::{middleware, Router};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// Requests only carry query parameters; bodies are capped.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Request routes shared by the server binary and tests.
///
/// The Prometheus endpoint is attached separately in `main` because it
/// carries its own state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", any(genimage::generate_image))
        .route("/genimage", any(genimage::generate_image))
        .route("/health", get(health::health_check))
        .with_state(state)
}

/// Middleware stack applied to every route.
///
/// CORS is outermost so that early rejections (such as an oversized body)
/// still carry the CORS headers.
pub fn with_layers(router: Router) -> Router {
    router
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(cors::cors))
}
