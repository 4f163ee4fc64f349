//! API credentials and admin updates
//!
//! Credentials live in the settings store under `CREDENTIALS_KEY`. The client
//! secret is write-only from the admin side: an update with a blank secret
//! keeps the stored one, and reads never hand it back out.

use common::Secret;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Stored API credentials plus the default workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Workflow used when a verification request doesn't name one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
}

impl Credentials {
    /// Both halves of the client credential are present.
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// Fail with `MissingCredentials` unless `is_complete()`.
    pub fn require_complete(&self) -> Result<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(Error::MissingCredentials)
        }
    }

    /// Whether switching from `self` to `other` invalidates a bearer token.
    pub fn auth_changed(&self, other: &Credentials) -> bool {
        self.client_id != other.client_id || self.client_secret != other.client_secret
    }

    /// Apply an admin update, returning the new credentials.
    ///
    /// - `client_id` / `workflow_id`: tags stripped, whitespace collapsed and trimmed.
    ///   An empty workflow clears the default.
    /// - `client_secret`: trimmed; blank keeps the existing secret. Tags are
    ///   stripped but punctuation and symbols are left alone.
    pub fn apply(&self, update: CredentialsUpdate) -> Credentials {
        let mut out = self.clone();

        if let Some(client_id) = update.client_id {
            out.client_id = sanitize_text(&client_id);
        }

        if let Some(secret) = update.client_secret {
            let trimmed = secret.expose().trim();
            if !trimmed.is_empty() {
                out.client_secret = Secret::new(strip_tags(trimmed));
            }
        }

        if let Some(workflow_id) = update.workflow_id {
            let workflow_id = sanitize_text(&workflow_id);
            out.workflow_id = (!workflow_id.is_empty()).then_some(workflow_id);
        }

        out
    }
}

/// Partial credentials update submitted by an admin. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsUpdate {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<Secret<String>>,
    #[serde(default)]
    pub workflow_id: Option<String>,
}

/// Remove anything that looks like a markup tag.
pub fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Plain single-line text: no tags, no control characters, collapsed whitespace.
pub fn sanitize_text(input: &str) -> String {
    let stripped = strip_tags(input);
    stripped
        .split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
