//! Normalization applied to field values before they leave the service.
//!
//! Every function here is idempotent.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use super::domain::{KindFields, RawSubmission, Submission, SubmissionKind, WorkAuthorization};
use super::rules::{Field, Violation, ViolationCode};

pub fn sanitize_text(value: &str) -> String {
    value.trim().to_string()
}

pub fn sanitize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Uppercase and render as `A1A 1A1` when the value has the six-character shape,
/// otherwise just trim and uppercase.
pub fn sanitize_postal_code(value: &str) -> String {
    let compact: String = value
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .map(|ch| ch.to_ascii_uppercase())
        .collect();

    if compact.len() == 6 && compact.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        format!("{} {}", &compact[..3], &compact[3..])
    } else {
        value.trim().to_ascii_uppercase()
    }
}

impl Submission {
    /// Build the forwardable submission from a body that already passed validation.
    ///
    /// Re-checks only what the type system needs (kind-specific fields present);
    /// format rules are the validator's job.
    pub fn sanitize(
        raw: &RawSubmission,
        kind: SubmissionKind,
        source_ip: Option<IpAddr>,
        now: DateTime<Utc>,
    ) -> Result<Self, Violation> {
        let text = |value: &Option<String>| value.as_deref().map(sanitize_text);

        let fields = match kind {
            SubmissionKind::Client => KindFields::Client {
                cleaning_details: text(&raw.cleaning_details).ok_or(Violation::new(
                    Field::CleaningDetails,
                    ViolationCode::Required,
                ))?,
            },
            SubmissionKind::Contractor => KindFields::Contractor {
                can_work_in_canada: raw
                    .can_work_in_canada
                    .as_deref()
                    .and_then(WorkAuthorization::parse)
                    .ok_or(Violation::new(
                        Field::CanWorkInCanada,
                        ViolationCode::MissingWorkAuth,
                    ))?,
                cleaning_experience: text(&raw.cleaning_experience).ok_or(Violation::new(
                    Field::CleaningExperience,
                    ViolationCode::Required,
                ))?,
            },
        };

        Ok(Self {
            fields,
            name: text(&raw.name).unwrap_or_default(),
            email: raw.email.as_deref().map(sanitize_email).unwrap_or_default(),
            postal_code: raw
                .postal_code
                .as_deref()
                .map(sanitize_postal_code)
                .unwrap_or_default(),
            timestamp: now,
            source_ip,
        })
    }
}
