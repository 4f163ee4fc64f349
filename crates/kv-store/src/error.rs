//! Error types for settings storage

/// Errors from the persisted settings store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("settings parse error: {0}")]
    Parse(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;
