//! Vouchsafe identity-verification API client
//!
//! Typed access to the remote Vouchsafe REST API with bearer-token caching.
//! Credentials and cache entries go through the `kv-store` ports, so this crate
//! has no opinion on where they are kept.
//!
//! Call flow:
//! 1. Admin stores credentials via `VouchsafeClient::update_credentials()`
//! 2. Any API call asks `bearer_token()`, which reuses the cached token or
//!    calls `authenticate()` and caches the result
//! 3. `request_verification()` creates a hosted verification and returns its URL
//! 4. `list_flows()` / `list_verifications()` back the admin views

pub mod client;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;
pub mod types;

pub use client::{ClientOptions, VouchsafeClient};
pub use constants::*;
pub use credentials::{Credentials, CredentialsUpdate};
pub use error::{Error, Result};
pub use token::{CachedToken, TokenResponse};
pub use types::{Flow, KNOWN_STATUSES, Verification, VerificationRequest, VerificationResult};
