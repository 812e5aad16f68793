use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::domain::{RawSubmission, Submission};
use super::relay::{Relay, RelayError};
use super::rules::Violation;
use super::validator::{validate, ValidationPolicy};

pub const SUCCESS_MESSAGE: &str = "Form submitted successfully";
pub const GENERIC_FAILURE_MESSAGE: &str = "Internal server error. Please try again later.";

/// Per-request progress through the submission endpoint. Requests only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SubmissionStage {
    Received,
    MethodChecked,
    Parsed,
    Validated,
    Sanitized,
    Relayed,
    Responded,
}

impl fmt::Display for SubmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SubmissionStage::Received => "received",
            SubmissionStage::MethodChecked => "method_checked",
            SubmissionStage::Parsed => "parsed",
            SubmissionStage::Validated => "validated",
            SubmissionStage::Sanitized => "sanitized",
            SubmissionStage::Relayed => "relayed",
            SubmissionStage::Responded => "responded",
        };
        f.write_str(label)
    }
}

/// Error raised while handling a submission. Every variant is terminal for the request.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("invalid input: {0}")]
    InvalidInput(Violation),
    #[error("request body is not a valid submission")]
    MalformedBody,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("relay destination is not configured")]
    Misconfiguration,
    #[error(transparent)]
    Upstream(RelayError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<RelayError> for SubmissionError {
    fn from(value: RelayError) -> Self {
        match value {
            RelayError::NotConfigured => Self::Misconfiguration,
            other => Self::Upstream(other),
        }
    }
}

impl SubmissionError {
    pub fn status(&self) -> StatusCode {
        match self {
            SubmissionError::InvalidInput(_) | SubmissionError::MalformedBody => {
                StatusCode::BAD_REQUEST
            }
            SubmissionError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            SubmissionError::Misconfiguration
            | SubmissionError::Upstream(_)
            | SubmissionError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the browser. Server-side failures are opaque.
    pub fn public_message(&self) -> String {
        match self {
            SubmissionError::InvalidInput(violation) => {
                format!("Invalid {}: {}", violation.field.label(), violation.message())
            }
            SubmissionError::MalformedBody => "Invalid request body".to_string(),
            SubmissionError::MethodNotAllowed => "Method not allowed".to_string(),
            SubmissionError::Misconfiguration => "Server configuration error".to_string(),
            SubmissionError::Upstream(_) | SubmissionError::Unexpected(_) => {
                GENERIC_FAILURE_MESSAGE.to_string()
            }
        }
    }
}

impl IntoResponse for SubmissionError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "message": self.public_message(),
        }));
        (self.status(), body).into_response()
    }
}

/// Validates, sanitizes and relays one submission per call.
///
/// Holds no mutable state, so one instance serves concurrent requests.
pub struct SubmissionService<R> {
    relay: Arc<R>,
    relay_timeout: Duration,
}

impl<R> SubmissionService<R>
where
    R: Relay + 'static,
{
    pub fn new(relay: Arc<R>, relay_timeout: Duration) -> Self {
        Self {
            relay,
            relay_timeout,
        }
    }

    /// Run a parsed body through validation and the relay.
    ///
    /// Client-side validation is never trusted; the fail-fast validator always runs here.
    pub async fn submit(
        &self,
        raw: RawSubmission,
        source_ip: Option<IpAddr>,
    ) -> Result<Submission, SubmissionError> {
        debug!(stage = %SubmissionStage::Parsed, "submission received");

        let kind = validate(&raw, ValidationPolicy::FailFast).map_err(|found| {
            match found.into_iter().next() {
                Some(violation) => {
                    info!(
                        field = %violation.field,
                        code = %violation.code,
                        "submission rejected"
                    );
                    SubmissionError::InvalidInput(violation)
                }
                None => SubmissionError::Unexpected("validation failed without a reason".into()),
            }
        })?;
        debug!(stage = %SubmissionStage::Validated, %kind);

        let submission = Submission::sanitize(&raw, kind, source_ip, Utc::now())
            .map_err(SubmissionError::InvalidInput)?;
        debug!(stage = %SubmissionStage::Sanitized, %kind);

        let receipt = match tokio::time::timeout(
            self.relay_timeout,
            self.relay.forward(&submission),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RelayError::TimedOut(self.relay_timeout)),
        };

        match receipt {
            Ok(receipt) => {
                info!(
                    stage = %SubmissionStage::Relayed,
                    %kind,
                    upstream_status = ?receipt.status,
                    "submission forwarded"
                );
                Ok(submission)
            }
            Err(RelayError::NotConfigured) => {
                error!("relay destination is not configured; submission dropped");
                Err(SubmissionError::Misconfiguration)
            }
            Err(err) => {
                match &err {
                    RelayError::Rejected { status, body } => {
                        warn!(code = RelayError::CODE, status, body = %body, "relay rejected submission")
                    }
                    other => warn!(code = RelayError::CODE, error = %other, "relay failed"),
                }
                Err(err.into())
            }
        }
    }
}
