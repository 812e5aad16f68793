use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tracing::{debug, info};

use super::domain::RawSubmission;
use super::relay::Relay;
use super::rules::RULE_TABLE;
use super::service::{SubmissionError, SubmissionService, SubmissionStage, SUCCESS_MESSAGE};
use super::validator::ValidationReport;

pub const SUBMIT_PATH: &str = "/api/submit-form";
pub const VALIDATE_PATH: &str = "/api/validate-form";
pub const RULES_PATH: &str = "/api/form-rules";
pub const HEALTH_PATH: &str = "/api/health";

/// Router builder exposing the waiting-list endpoints.
pub fn waitlist_router<R>(service: Arc<SubmissionService<R>>) -> Router
where
    R: Relay + 'static,
{
    Router::new()
        .route(
            SUBMIT_PATH,
            post(submit_handler::<R>).fallback(method_not_allowed),
        )
        .route(
            VALIDATE_PATH,
            post(validate_handler).fallback(method_not_allowed),
        )
        .route(RULES_PATH, get(rules_handler))
        .route(HEALTH_PATH, get(health_handler))
        .with_state(service)
}

pub(crate) async fn submit_handler<R>(
    State(service): State<Arc<SubmissionService<R>>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    payload: Result<Json<RawSubmission>, JsonRejection>,
) -> Response
where
    R: Relay + 'static,
{
    debug!(stage = %SubmissionStage::Received, "submit-form");
    debug!(stage = %SubmissionStage::MethodChecked, "submit-form");

    let Json(raw) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            info!(reason = %rejection.body_text(), "submission body rejected");
            return SubmissionError::MalformedBody.into_response();
        }
    };

    let source_ip = connect_info.map(|ConnectInfo(addr)| addr.ip());
    let response = match service.submit(raw, source_ip).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": SUCCESS_MESSAGE })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    };

    debug!(stage = %SubmissionStage::Responded, status = response.status().as_u16());
    response
}

/// Collect-all validation for browsers; never forwards anything.
pub(crate) async fn validate_handler(
    payload: Result<Json<RawSubmission>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(raw)) => Json(ValidationReport::for_submission(&raw)).into_response(),
        Err(_) => SubmissionError::MalformedBody.into_response(),
    }
}

pub(crate) async fn rules_handler() -> Json<serde_json::Value> {
    Json(json!({ "rules": RULE_TABLE }))
}

pub(crate) async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

pub(crate) async fn method_not_allowed(method: Method) -> Response {
    debug!(stage = %SubmissionStage::Received, %method, "rejected before parsing");
    SubmissionError::MethodNotAllowed.into_response()
}
