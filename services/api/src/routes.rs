use crate::infra::{cors_layer, rate_limit, AppState, RateLimiter};
use axum::http::{header, StatusCode};
use axum::middleware;
use axum::response::IntoResponse;
use axum::{Extension, Json, Router};
use serde_json::json;
use skrubb_waitlist::config::CorsConfig;
use skrubb_waitlist::waitlist::{waitlist_router, Relay, SubmissionService};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Waiting-list routes plus operational endpoints, wrapped in rate limiting and CORS.
pub(crate) fn build_router<R>(
    service: Arc<SubmissionService<R>>,
    state: AppState,
    cors_config: CorsConfig,
    limiter: RateLimiter,
) -> Router
where
    R: Relay + 'static,
{
    waitlist_router(service)
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .layer(middleware::from_fn_with_state(limiter, rate_limit))
        .layer(cors_layer(&cors_config))
        .layer(Extension(state))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
