//! Error types for Vouchsafe API operations

/// Errors from Vouchsafe API operations.
///
/// None of these are retried; callers decide what the end user sees.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Vouchsafe client ID/secret are not configured")]
    MissingCredentials,

    #[error("authentication failed ({status}): {body}")]
    Auth { status: u16, body: String },

    #[error("{operation} failed ({status}): {body}")]
    Http {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("{operation} request failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("unexpected response shape: {0}")]
    Shape(String),

    #[error("settings store error: {0}")]
    Store(#[from] kv_store::Error),
}

impl Error {
    /// Upstream HTTP status, if the remote service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Auth { status, .. } | Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingCredentials => "missing_credentials",
            Error::Auth { .. } => "auth",
            Error::Http { .. } => "http",
            Error::Transport { .. } => "transport",
            Error::Shape(_) => "shape",
            Error::Store(_) => "store",
        }
    }
}

/// Result alias for API operations.
pub type Result<T> = std::result::Result<T, Error>;
