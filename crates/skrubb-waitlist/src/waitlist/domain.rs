use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Which waiting list the signup is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionKind {
    Client,
    Contractor,
}

impl SubmissionKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "client" => Some(Self::Client),
            "contractor" => Some(Self::Contractor),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionKind::Client => "client",
            SubmissionKind::Contractor => "contractor",
        }
    }
}

impl fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contractor answer to "can you legally work in Canada?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkAuthorization {
    Yes,
    No,
}

impl WorkAuthorization {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("yes") {
            Some(Self::Yes)
        } else if trimmed.eq_ignore_ascii_case("no") {
            Some(Self::No)
        } else {
            None
        }
    }
}

/// Untrusted form body as posted by the landing page.
///
/// Every field is optional text so that a missing or mistyped value becomes a
/// field violation rather than a body parse failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSubmission {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub cleaning_details: Option<String>,
    #[serde(default)]
    pub can_work_in_canada: Option<String>,
    #[serde(default)]
    pub cleaning_experience: Option<String>,
}

/// Fields that depend on the submission kind. Exactly one set is ever present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KindFields {
    #[serde(rename_all = "camelCase")]
    Client { cleaning_details: String },
    #[serde(rename_all = "camelCase")]
    Contractor {
        can_work_in_canada: WorkAuthorization,
        cleaning_experience: String,
    },
}

impl KindFields {
    pub fn kind(&self) -> SubmissionKind {
        match self {
            KindFields::Client { .. } => SubmissionKind::Client,
            KindFields::Contractor { .. } => SubmissionKind::Contractor,
        }
    }
}

/// A validated, sanitized signup ready to be forwarded downstream.
///
/// Never persisted: it lives for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(flatten)]
    pub fields: KindFields,
    pub name: String,
    pub email: String,
    pub postal_code: String,
    #[serde(serialize_with = "serialize_iso8601")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "ip", skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<IpAddr>,
}

impl Submission {
    pub fn kind(&self) -> SubmissionKind {
        self.fields.kind()
    }

    /// Timestamp rendered the way browsers render `Date.toISOString()`.
    pub fn timestamp_iso8601(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

fn serialize_iso8601<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}
