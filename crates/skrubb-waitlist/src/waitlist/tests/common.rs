use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::waitlist::domain::{RawSubmission, Submission};
use crate::waitlist::relay::{Relay, RelayError, RelayReceipt};
use crate::waitlist::service::SubmissionService;

pub(super) const BOUNDARY_LENGTHS: [usize; 10] = [1, 2, 10, 50, 51, 99, 100, 101, 500, 501];

pub(super) fn client_submission() -> RawSubmission {
    RawSubmission {
        kind: Some("client".to_string()),
        name: Some("Jane Doe".to_string()),
        email: Some("jane@example.com".to_string()),
        postal_code: Some("K1A0B1".to_string()),
        cleaning_details: Some("Need full apartment deep clean".to_string()),
        ..RawSubmission::default()
    }
}

pub(super) fn contractor_submission() -> RawSubmission {
    RawSubmission {
        kind: Some("contractor".to_string()),
        name: Some("Marc-Andre O'Neil".to_string()),
        email: Some("  Marc@Example.CA ".to_string()),
        postal_code: Some("h2x 1y4".to_string()),
        can_work_in_canada: Some("yes".to_string()),
        cleaning_experience: Some("  Six years of residential cleaning  ".to_string()),
        ..RawSubmission::default()
    }
}

pub(super) fn broken_contractor_submission() -> RawSubmission {
    RawSubmission {
        kind: Some("contractor".to_string()),
        name: Some("A".to_string()),
        email: Some("bad".to_string()),
        postal_code: Some("000".to_string()),
        can_work_in_canada: Some(String::new()),
        cleaning_experience: Some(String::new()),
        ..RawSubmission::default()
    }
}

fn email_of_len(len: usize) -> String {
    if len < 5 {
        "a@b.c"[..len].to_string()
    } else {
        format!("{}@b.c", "a".repeat(len - 4))
    }
}

/// Deterministic mix of valid and invalid bodies whose field lengths sit on the rule boundaries.
pub(super) fn generated_submissions() -> Vec<RawSubmission> {
    const NAME_FILL: [char; 7] = ['a', 'Z', ' ', '-', '\'', '1', 'é'];
    const POSTAL: [&str; 6] = ["K1A 0B1", "k1a0b1", "000", "K1A  0B1", "", "Z9Z9Z9"];
    const WORK_AUTH: [&str; 4] = ["yes", "no", "", "maybe"];

    let mut seed: u32 = 0x5eed;
    (0..100)
        .map(|i| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let pick = (seed >> 8) as usize;
            let len = BOUNDARY_LENGTHS[i % 10];
            let other = BOUNDARY_LENGTHS[(i / 10) % 10];
            let fill = NAME_FILL[pick % NAME_FILL.len()];

            let name = format!("A{}", fill.to_string().repeat(len - 1));
            let text = "x".repeat(if pick % 3 == 0 { len } else { other });

            RawSubmission {
                kind: Some(if i % 2 == 0 { "client" } else { "contractor" }.to_string()),
                name: Some(name),
                email: Some(email_of_len(other)),
                postal_code: Some(POSTAL[pick % POSTAL.len()].to_string()),
                cleaning_details: (i % 2 == 0).then(|| text.clone()),
                can_work_in_canada: (i % 2 == 1)
                    .then(|| WORK_AUTH[(pick / 7) % WORK_AUTH.len()].to_string()),
                cleaning_experience: (i % 2 == 1).then_some(text),
            }
        })
        .collect()
}

#[derive(Default)]
pub(super) struct RecordingRelay {
    forwarded: Mutex<Vec<Submission>>,
}

impl RecordingRelay {
    pub(super) fn forwarded(&self) -> Vec<Submission> {
        self.forwarded.lock().expect("relay mutex poisoned").clone()
    }
}

#[async_trait]
impl Relay for RecordingRelay {
    async fn forward(&self, submission: &Submission) -> Result<RelayReceipt, RelayError> {
        self.forwarded
            .lock()
            .expect("relay mutex poisoned")
            .push(submission.clone());
        Ok(RelayReceipt { status: Some(200) })
    }
}

pub(super) struct RejectingRelay;

#[async_trait]
impl Relay for RejectingRelay {
    async fn forward(&self, _submission: &Submission) -> Result<RelayReceipt, RelayError> {
        Err(RelayError::Rejected {
            status: 502,
            body: "upstream stack trace at https://script.example.com/exec".to_string(),
        })
    }
}

pub(super) struct UnconfiguredRelay;

#[async_trait]
impl Relay for UnconfiguredRelay {
    async fn forward(&self, _submission: &Submission) -> Result<RelayReceipt, RelayError> {
        Err(RelayError::NotConfigured)
    }
}

pub(super) struct StalledRelay;

#[async_trait]
impl Relay for StalledRelay {
    async fn forward(&self, _submission: &Submission) -> Result<RelayReceipt, RelayError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(RelayReceipt { status: Some(200) })
    }
}

pub(super) fn service_with<R: Relay + 'static>(relay: R) -> Arc<SubmissionService<R>> {
    Arc::new(SubmissionService::new(
        Arc::new(relay),
        Duration::from_secs(10),
    ))
}

pub(super) fn recording_service() -> (Arc<SubmissionService<RecordingRelay>>, Arc<RecordingRelay>) {
    let relay = Arc::new(RecordingRelay::default());
    let service = Arc::new(SubmissionService::new(
        relay.clone(),
        Duration::from_secs(10),
    ));
    (service, relay)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&body).expect("body is json")
}
