//! Request and response schemas for the verification endpoints

use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Statuses the remote service reports, usable as a list filter.
pub const KNOWN_STATUSES: &[&str] = &[
    "InProgress",
    "ReadyForReview",
    "Verified",
    "Refused",
    "Cancelled",
    "LockedOut",
];

/// A verification flow template defined in the Vouchsafe dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Flow {
    /// Name for display, falling back to the id.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.id,
        }
    }
}

/// Body of `POST /verifications`. Absent optional fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerificationRequest {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl VerificationRequest {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }
}

/// Response of `POST /verifications`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationResult {
    #[serde(default)]
    pub id: Option<String>,
    /// Hosted flow the end user is redirected to
    pub url: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// One row of `GET /verifications`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Verification {
    pub id: Option<String>,
    pub status: Option<String>,
    pub email: Option<String>,
    pub workflow_id: Option<String>,
    pub created_at: Option<String>,
}

impl Verification {
    /// Creation time in unix seconds; missing or unparseable counts as epoch zero.
    pub fn created_timestamp(&self) -> i64 {
        self.created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.timestamp())
            .unwrap_or(0)
    }
}

/// Newest first. Stable, so rows with equal timestamps keep the server order.
pub fn sort_newest_first(rows: &mut [Verification]) {
    rows.sort_by_key(|row| std::cmp::Reverse(row.created_timestamp()));
}
