//! Service-specific error types

use axum::http::StatusCode;
use thiserror::Error;

/// Message shown when a verification could not be started. Upstream details
/// stay in the logs.
pub const START_FAILED_MESSAGE: &str = "Sorry, we could not start your verification.";

/// Message shown for a missing or malformed email.
pub const INVALID_EMAIL_MESSAGE: &str = "Missing or invalid email.";

/// Failures of the public request endpoint.
///
/// `Display` carries the internal detail for logs; end users only ever see
/// `user_message()`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid email: {0}")]
    InvalidEmail(String),

    #[error(transparent)]
    Upstream(#[from] vouchsafe_api::Error),

    #[error("verification url is not a usable redirect: {0:?}")]
    BadVerificationUrl(String),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidEmail(_) => StatusCode::BAD_REQUEST,
            Error::Upstream(_) | Error::BadVerificationUrl(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Error::InvalidEmail(_) => INVALID_EMAIL_MESSAGE,
            Error::Upstream(_) | Error::BadVerificationUrl(_) => START_FAILED_MESSAGE,
        }
    }
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_email_is_client_error() {
        let err = Error::InvalidEmail("email must contain an '@' character".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.user_message(), "Missing or invalid email.");
    }

    #[test]
    fn upstream_detail_never_reaches_user_message() {
        let err = Error::Upstream(vouchsafe_api::Error::Http {
            operation: "create verification",
            status: 500,
            body: "stack trace at db.rs:42".into(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), START_FAILED_MESSAGE);
        assert!(err.to_string().contains("stack trace"));
    }
}
