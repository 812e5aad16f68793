//! Waiting-list signup intake: shared validation rules, sanitization, and the relay
//! that forwards accepted signups to the spreadsheet sink.

pub mod domain;
pub mod relay;
pub mod router;
pub mod rules;
pub mod sanitize;
pub mod service;
pub mod validator;

#[cfg(test)]
mod tests;

pub use domain::{KindFields, RawSubmission, Submission, SubmissionKind, WorkAuthorization};
pub use relay::{HttpRelay, Relay, RelayError, RelayReceipt};
pub use router::waitlist_router;
pub use rules::{Field, FieldRule, Violation, ViolationCode, RULE_TABLE};
pub use service::{SubmissionError, SubmissionService, SubmissionStage};
pub use validator::{validate, violations, ValidationPolicy, ValidationReport};
