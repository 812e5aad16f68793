//! The single rule table shared by the browser-facing and server-facing validators.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Form fields that can carry a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Field {
    #[serde(rename = "type")]
    Kind,
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "postalCode")]
    PostalCode,
    #[serde(rename = "canWorkInCanada")]
    CanWorkInCanada,
    #[serde(rename = "cleaningDetails")]
    CleaningDetails,
    #[serde(rename = "cleaningExperience")]
    CleaningExperience,
}

impl Field {
    /// Wire name of the field in the JSON body.
    pub fn key(self) -> &'static str {
        match self {
            Field::Kind => "type",
            Field::Name => "name",
            Field::Email => "email",
            Field::PostalCode => "postalCode",
            Field::CanWorkInCanada => "canWorkInCanada",
            Field::CleaningDetails => "cleaningDetails",
            Field::CleaningExperience => "cleaningExperience",
        }
    }

    /// Lowercase label used in aggregate server messages.
    pub fn label(self) -> &'static str {
        match self {
            Field::Kind => "form type",
            Field::Name => "name",
            Field::Email => "email",
            Field::PostalCode => "postal code",
            Field::CanWorkInCanada => "work authorization",
            Field::CleaningDetails => "cleaning details",
            Field::CleaningExperience => "cleaning experience",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Machine-readable reason a field failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    Required,
    EmptyOrShort,
    TooShort,
    TooLong,
    BadChars,
    BadFormat,
    MissingWorkAuth,
    BadWorkAuth,
    InvalidKind,
}

impl ViolationCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationCode::Required => "REQUIRED",
            ViolationCode::EmptyOrShort => "EMPTY_OR_SHORT",
            ViolationCode::TooShort => "TOO_SHORT",
            ViolationCode::TooLong => "TOO_LONG",
            ViolationCode::BadChars => "BAD_CHARS",
            ViolationCode::BadFormat => "BAD_FORMAT",
            ViolationCode::MissingWorkAuth => "MISSING_WORK_AUTH",
            ViolationCode::BadWorkAuth => "BAD_WORK_AUTH",
            ViolationCode::InvalidKind => "INVALID_KIND",
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed check on one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Violation {
    pub field: Field,
    pub code: ViolationCode,
}

impl Violation {
    pub const fn new(field: Field, code: ViolationCode) -> Self {
        Self { field, code }
    }

    /// Message shown next to the offending input.
    pub fn message(&self) -> &'static str {
        use Field::*;
        use ViolationCode::*;

        match (self.field, self.code) {
            (Kind, _) => "Please choose whether you are joining as a client or a contractor",
            (Name, TooLong) => "Name must be less than 50 characters",
            (Name, BadChars) => {
                "Name can only contain letters, spaces, hyphens, and apostrophes"
            }
            (Name, _) => "Name must be at least 2 characters long",
            (Email, Required) => "Email is required",
            (Email, TooLong) => "Email must be less than 100 characters",
            (Email, _) => "Please enter a valid email address",
            (PostalCode, Required) => "Postal code is required",
            (PostalCode, _) => "Please enter a valid Canadian postal code (e.g., A1A 1A1)",
            (CanWorkInCanada, BadWorkAuth) => "Please answer yes or no",
            (CanWorkInCanada, _) => "Please select whether you can work in Canada",
            (CleaningDetails, TooShort) => "Please provide more details (at least 10 characters)",
            (CleaningDetails, TooLong) => "Details must be less than 500 characters",
            (CleaningDetails, _) => "Please describe what you would like cleaned",
            (CleaningExperience, TooShort) => {
                "Please provide more details about your experience (at least 10 characters)"
            }
            (CleaningExperience, TooLong) => {
                "Experience description must be less than 500 characters"
            }
            (CleaningExperience, _) => "Please describe your cleaning experience",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.field, self.code, self.message())
    }
}

impl std::error::Error for Violation {}

impl Serialize for Violation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Violation", 3)?;
        state.serialize_field("field", &self.field)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", self.message())?;
        state.end()
    }
}

/// Named patterns; compiled once on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Pattern {
    PersonName,
    Email,
    PostalCode,
}

impl Pattern {
    // `[0-9]` rather than `\d`, which would also admit non-ASCII digits.
    pub fn source(self) -> &'static str {
        match self {
            Pattern::PersonName => r"^[A-Za-z\s\-']+$",
            Pattern::Email => r"^[^\s@]+@[^\s@]+\.[^\s@]+$",
            Pattern::PostalCode => r"^[A-Za-z][0-9][A-Za-z]\s?[0-9][A-Za-z][0-9]$",
        }
    }

    pub fn regex(self) -> &'static Regex {
        static PERSON_NAME: OnceLock<Regex> = OnceLock::new();
        static EMAIL: OnceLock<Regex> = OnceLock::new();
        static POSTAL_CODE: OnceLock<Regex> = OnceLock::new();

        let cell = match self {
            Pattern::PersonName => &PERSON_NAME,
            Pattern::Email => &EMAIL,
            Pattern::PostalCode => &POSTAL_CODE,
        };
        cell.get_or_init(|| Regex::new(self.source()).expect("static pattern compiles"))
    }

    pub fn is_match(self, value: &str) -> bool {
        self.regex().is_match(value)
    }
}

/// One step of a field rule, evaluated against the trimmed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "check", rename_all = "camelCase")]
pub enum Check {
    Required,
    MinChars { min: usize, code: ViolationCode },
    MaxChars { max: usize },
    Pattern { pattern: Pattern, code: ViolationCode },
}

impl Check {
    fn holds(&self, trimmed: &str, char_count: usize) -> Result<(), ViolationCode> {
        match *self {
            Check::Required if trimmed.is_empty() => Err(ViolationCode::Required),
            Check::MinChars { min, code } if char_count < min => Err(code),
            Check::MaxChars { max } if char_count > max => Err(ViolationCode::TooLong),
            Check::Pattern { pattern, code } if !pattern.is_match(trimmed) => Err(code),
            _ => Ok(()),
        }
    }
}

/// Ordered checks for a single text field; the first failing check wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldRule {
    pub field: Field,
    pub checks: &'static [Check],
}

impl FieldRule {
    /// Apply the rule to a possibly-absent raw value. Absent is treated as empty.
    pub fn apply(&self, value: Option<&str>) -> Result<(), Violation> {
        let trimmed = value.unwrap_or_default().trim();
        let char_count = trimmed.chars().count();

        for check in self.checks {
            check
                .holds(trimmed, char_count)
                .map_err(|code| Violation::new(self.field, code))?;
        }
        Ok(())
    }
}

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 50;
pub const EMAIL_MAX_CHARS: usize = 100;
pub const FREE_TEXT_MIN_CHARS: usize = 10;
pub const FREE_TEXT_MAX_CHARS: usize = 500;

pub const NAME_RULE: FieldRule = FieldRule {
    field: Field::Name,
    checks: &[
        Check::MinChars {
            min: NAME_MIN_CHARS,
            code: ViolationCode::EmptyOrShort,
        },
        Check::MaxChars {
            max: NAME_MAX_CHARS,
        },
        Check::Pattern {
            pattern: Pattern::PersonName,
            code: ViolationCode::BadChars,
        },
    ],
};

pub const EMAIL_RULE: FieldRule = FieldRule {
    field: Field::Email,
    checks: &[
        Check::Required,
        Check::Pattern {
            pattern: Pattern::Email,
            code: ViolationCode::BadFormat,
        },
        Check::MaxChars {
            max: EMAIL_MAX_CHARS,
        },
    ],
};

pub const POSTAL_CODE_RULE: FieldRule = FieldRule {
    field: Field::PostalCode,
    checks: &[
        Check::Required,
        Check::Pattern {
            pattern: Pattern::PostalCode,
            code: ViolationCode::BadFormat,
        },
    ],
};

const FREE_TEXT_CHECKS: &[Check] = &[
    Check::Required,
    Check::MinChars {
        min: FREE_TEXT_MIN_CHARS,
        code: ViolationCode::TooShort,
    },
    Check::MaxChars {
        max: FREE_TEXT_MAX_CHARS,
    },
];

pub const CLEANING_DETAILS_RULE: FieldRule = FieldRule {
    field: Field::CleaningDetails,
    checks: FREE_TEXT_CHECKS,
};

pub const CLEANING_EXPERIENCE_RULE: FieldRule = FieldRule {
    field: Field::CleaningExperience,
    checks: FREE_TEXT_CHECKS,
};

/// Every text rule, in form order. Published to browsers as-is.
pub const RULE_TABLE: &[FieldRule] = &[
    NAME_RULE,
    EMAIL_RULE,
    POSTAL_CODE_RULE,
    CLEANING_DETAILS_RULE,
    CLEANING_EXPERIENCE_RULE,
];
