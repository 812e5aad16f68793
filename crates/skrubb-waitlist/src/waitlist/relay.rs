//! Forwarding of validated submissions to the spreadsheet-backed sink.
//!
//! No idempotency is offered: the sink appends a row per POST, so a caller that
//! retries a forward may create a duplicate row.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use super::domain::Submission;
use crate::config::{PayloadFormat, RelayConfig};

/// Upstream bodies are truncated to this many bytes before being kept for logs.
const MAX_UPSTREAM_BODY: usize = 512;

/// What the relay could observe about a forward that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayReceipt {
    /// Upstream status, present only when the response was inspected.
    pub status: Option<u16>,
}

/// Error raised when a submission could not be forwarded. All variants map to `RELAY_FAILED`.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("relay destination is not configured")]
    NotConfigured,
    #[error("relay timed out after {0:?}")]
    TimedOut(Duration),
    #[error("relay transport failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("relay destination rejected the submission with status {status}")]
    Rejected { status: u16, body: String },
}

impl RelayError {
    pub const CODE: &'static str = "RELAY_FAILED";

    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            RelayError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A single-attempt sink for validated submissions.
#[async_trait]
pub trait Relay: Send + Sync {
    async fn forward(&self, submission: &Submission) -> Result<RelayReceipt, RelayError>;
}

/// Relay that POSTs to an HTTP endpoint.
pub struct HttpRelay {
    client: Client,
    destination: Option<Url>,
    payload_format: PayloadFormat,
    response_inspectable: bool,
    timeout: Duration,
}

impl HttpRelay {
    pub fn new(config: &RelayConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            destination: config.destination.clone(),
            payload_format: config.payload_format,
            response_inspectable: config.response_inspectable,
            timeout: config.timeout,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.destination.is_some()
    }

    fn classify(&self, err: reqwest::Error) -> RelayError {
        if err.is_timeout() {
            RelayError::TimedOut(self.timeout)
        } else {
            // Drop the URL so it cannot leak through a Display chain.
            RelayError::Transport(err.without_url())
        }
    }
}

/// URL-encoded fields sent in `Form` mode.
pub fn form_fields(submission: &Submission) -> Vec<(&'static str, String)> {
    vec![
        ("email", submission.email.clone()),
        ("type", submission.kind().as_str().to_string()),
        ("timestamp", submission.timestamp_iso8601()),
    ]
}

#[async_trait]
impl Relay for HttpRelay {
    async fn forward(&self, submission: &Submission) -> Result<RelayReceipt, RelayError> {
        let destination = self.destination.clone().ok_or(RelayError::NotConfigured)?;

        let request = match self.payload_format {
            PayloadFormat::Json => self
                .client
                .post(destination)
                .header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                .json(submission),
            PayloadFormat::Form => self
                .client
                .post(destination)
                .header(
                    CONTENT_TYPE,
                    mime::APPLICATION_WWW_FORM_URLENCODED.as_ref(),
                )
                .form(&form_fields(submission)),
        };

        let response = request.send().await.map_err(|err| self.classify(err))?;

        if !self.response_inspectable {
            debug!(kind = %submission.kind(), "relay sent without inspecting response");
            return Ok(RelayReceipt { status: None });
        }

        let status = response.status();
        if status.is_success() {
            return Ok(RelayReceipt {
                status: Some(status.as_u16()),
            });
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_UPSTREAM_BODY {
            let mut cut = MAX_UPSTREAM_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        warn!(status = status.as_u16(), "relay destination returned an error status");

        Err(RelayError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
