//! Pure field validators and the two policies built on top of them.
//!
//! Both policies walk the same ordered list of violations, so a submission that
//! passes one passes the other, and the fail-fast result is always the head of
//! the collect-all result.

use serde::Serialize;

use super::domain::{RawSubmission, SubmissionKind, WorkAuthorization};
use super::rules::{
    Field, Violation, ViolationCode, CLEANING_DETAILS_RULE, CLEANING_EXPERIENCE_RULE, EMAIL_RULE,
    NAME_RULE, POSTAL_CODE_RULE,
};

/// Outcome of checking one field.
pub type FieldVerdict = Result<(), Violation>;

pub fn validate_kind(value: Option<&str>) -> Result<SubmissionKind, Violation> {
    value
        .and_then(SubmissionKind::parse)
        .ok_or(Violation::new(Field::Kind, ViolationCode::InvalidKind))
}

pub fn validate_name(value: Option<&str>) -> FieldVerdict {
    NAME_RULE.apply(value)
}

pub fn validate_email(value: Option<&str>) -> FieldVerdict {
    EMAIL_RULE.apply(value)
}

pub fn validate_postal_code(value: Option<&str>) -> FieldVerdict {
    POSTAL_CODE_RULE.apply(value)
}

/// Description field for clients, experience field for contractors.
pub fn validate_free_text(value: Option<&str>, kind: SubmissionKind) -> FieldVerdict {
    match kind {
        SubmissionKind::Client => CLEANING_DETAILS_RULE.apply(value),
        SubmissionKind::Contractor => CLEANING_EXPERIENCE_RULE.apply(value),
    }
}

pub fn validate_work_authorization(value: Option<&str>) -> FieldVerdict {
    match value.map(str::trim) {
        None | Some("") => Err(Violation::new(
            Field::CanWorkInCanada,
            ViolationCode::MissingWorkAuth,
        )),
        Some(answer) => WorkAuthorization::parse(answer).map(|_| ()).ok_or(Violation::new(
            Field::CanWorkInCanada,
            ViolationCode::BadWorkAuth,
        )),
    }
}

/// Checks for the fields that only one kind requires, in form order.
pub fn validate_kind_fields(raw: &RawSubmission, kind: SubmissionKind) -> Vec<Violation> {
    let verdicts = match kind {
        SubmissionKind::Client => vec![validate_free_text(
            raw.cleaning_details.as_deref(),
            kind,
        )],
        SubmissionKind::Contractor => vec![
            validate_work_authorization(raw.can_work_in_canada.as_deref()),
            validate_free_text(raw.cleaning_experience.as_deref(), kind),
        ],
    };

    verdicts.into_iter().filter_map(Result::err).collect()
}

/// Every violation in canonical order: type, name, email, postal code, then the
/// kind-specific fields. An unrecognized type skips the kind-specific checks.
pub fn violations(raw: &RawSubmission) -> Vec<Violation> {
    let kind = validate_kind(raw.kind.as_deref());

    let mut found: Vec<Violation> = [
        kind.map(|_| ()),
        validate_name(raw.name.as_deref()),
        validate_email(raw.email.as_deref()),
        validate_postal_code(raw.postal_code.as_deref()),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect();

    if let Ok(kind) = kind {
        found.extend(validate_kind_fields(raw, kind));
    }
    found
}

/// How many violations a caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPolicy {
    /// Report every invalid field so a form can annotate all of them at once.
    CollectAll,
    /// Stop at the first invalid field.
    FailFast,
}

/// Validate a raw body under the given policy, returning the recognized kind on success.
pub fn validate(
    raw: &RawSubmission,
    policy: ValidationPolicy,
) -> Result<SubmissionKind, Vec<Violation>> {
    let mut found = violations(raw);
    if found.is_empty() {
        return validate_kind(raw.kind.as_deref()).map_err(|violation| vec![violation]);
    }

    if policy == ValidationPolicy::FailFast {
        found.truncate(1);
    }
    Err(found)
}

/// Collect-all result shaped for the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn for_submission(raw: &RawSubmission) -> Self {
        let violations = match validate(raw, ValidationPolicy::CollectAll) {
            Ok(_) => Vec::new(),
            Err(found) => found,
        };
        Self {
            valid: violations.is_empty(),
            violations,
        }
    }
}
