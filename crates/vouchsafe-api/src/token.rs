//! Bearer token decoding and cache lifetime
//!
//! `/authenticate` answers with an absolute `expires_at` timestamp. The token
//! is usable until five minutes before that. The cache entry holding it gets
//! a TTL of at least a minute, but the token itself is never handed out past
//! its buffered expiry.

use std::time::Duration;

use chrono::{DateTime, Utc};
use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{FALLBACK_TOKEN_LIFETIME, MIN_TOKEN_CACHE_TTL, TOKEN_EXPIRY_BUFFER};
use crate::error::{Error, Result};

/// Body sent to `/authenticate`.
#[derive(Debug, Serialize)]
pub(crate) struct AuthenticateRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

/// Response from `/authenticate`.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// RFC 3339 timestamp, absolute
    pub expires_at: String,
}

impl TokenResponse {
    /// Decode and check an authenticate response body.
    pub fn decode(body: &str) -> Result<Self> {
        let token: TokenResponse = serde_json::from_str(body)
            .map_err(|e| Error::Shape(format!("authenticate response: {e}")))?;
        if token.access_token.is_empty() || token.expires_at.is_empty() {
            return Err(Error::Shape(
                "authenticate response has empty access_token or expires_at".into(),
            ));
        }
        Ok(token)
    }

    /// Server-side expiry. An unparseable timestamp is taken as one day from `now`.
    pub fn expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(t) => t.with_timezone(&Utc),
            Err(e) => {
                warn!(
                    expires_at = %self.expires_at,
                    error = %e,
                    "unparseable token expiry, assuming one day"
                );
                now + to_chrono(FALLBACK_TOKEN_LIFETIME)
            }
        }
    }

    /// Build the cache entry for this token as of `now`.
    pub fn into_cached(self, now: DateTime<Utc>) -> CachedToken {
        let expires_at = buffered_expiry(self.expiry(now));
        CachedToken {
            token: Secret::new(self.access_token),
            expires_at,
        }
    }
}

/// A bearer token as held in the cache.
///
/// `expires_at` is the buffered expiry (server expiry minus five minutes), not
/// the server-side one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    token: Secret<String>,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: Secret::new(token.into()),
            expires_at,
        }
    }

    pub fn token(&self) -> &str {
        self.token.expose()
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && now < self.expires_at
    }

    /// TTL for the cache entry as of `now`: time left until the buffered
    /// expiry, floored at `MIN_TOKEN_CACHE_TTL`.
    pub fn cache_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
            .max(MIN_TOKEN_CACHE_TTL)
    }
}

/// `server_expiry - 5min`.
pub fn buffered_expiry(server_expiry: DateTime<Utc>) -> DateTime<Utc> {
    server_expiry - to_chrono(TOKEN_EXPIRY_BUFFER)
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::seconds(d.as_secs() as i64)
}
