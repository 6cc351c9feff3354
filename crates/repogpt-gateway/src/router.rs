use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{chat_handler, health_handler, ingest_file_handler, ingest_repo_handler};
use crate::middleware::{BearerAuth, RateLimiter, require_bearer, throttle};
use crate::server::{AppState, GatewayOptions};

/// `/health` stays open; everything under `/api` goes through the guards.
pub(crate) fn build_router(state: AppState, options: &GatewayOptions) -> Router {
    let auth = BearerAuth::new(options.auth_token.as_deref());
    let limiter = RateLimiter::new(options.rate_limit);

    let api = Router::new()
        .route("/api/embeddings/repo", post(ingest_repo_handler))
        .route("/api/embeddings", post(ingest_file_handler))
        .route("/api/chat", post(chat_handler))
        .layer(middleware::from_fn_with_state(limiter, throttle))
        .layer(middleware::from_fn_with_state(auth, require_bearer))
        .layer(RequestBodyLimitLayer::new(options.max_body_size));

    Router::new()
        .route("/health", get(health_handler))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
