//! Vouchsafe REST client
//!
//! Wraps the four remote endpoints behind typed methods. Credentials are read
//! from the injected `SettingsStore` on every call, the bearer token and the
//! admin flow list live in the injected `Cache`.
//!
//! Token lifecycle: no cache entry (or past its buffered deadline) means the
//! next call authenticates; any client_id/client_secret edit deletes the entry.
//! Concurrent misses may both authenticate; the last write wins, and both
//! tokens are valid.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use kv_store::{Cache, SettingsStore};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::constants::{
    API_BASE, AUTH_TIMEOUT, CREDENTIALS_KEY, FLOWS_CACHE_KEY, FLOWS_CACHE_TTL, REQUEST_TIMEOUT,
    TOKEN_CACHE_KEY,
};
use crate::credentials::{Credentials, CredentialsUpdate};
use crate::error::{Error, Result};
use crate::token::{AuthenticateRequest, CachedToken, TokenResponse};
use crate::types::{Flow, Verification, VerificationRequest, VerificationResult, sort_newest_first};

/// Endpoint base and per-call timeouts.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    /// Used for `/authenticate` and the list endpoints
    pub auth_timeout: Duration,
    /// Used for creating a verification
    pub request_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: API_BASE.to_string(),
            auth_timeout: AUTH_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Client for the Vouchsafe API.
///
/// Cheap to share behind an `Arc`; holds no state of its own beyond the
/// injected stores.
pub struct VouchsafeClient {
    http: reqwest::Client,
    options: ClientOptions,
    settings: Arc<dyn SettingsStore>,
    cache: Arc<dyn Cache>,
}

impl VouchsafeClient {
    pub fn new(
        http: reqwest::Client,
        options: ClientOptions,
        settings: Arc<dyn SettingsStore>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        Self {
            http,
            options,
            settings,
            cache,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.options.base_url.trim_end_matches('/'), path)
    }

    /// Stored credentials (all-empty when nothing has been configured).
    pub async fn credentials(&self) -> Result<Credentials> {
        match self.settings.get(CREDENTIALS_KEY).await? {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                Error::Store(kv_store::Error::Parse(format!("stored credentials: {e}")))
            }),
            None => Ok(Credentials::default()),
        }
    }

    /// Apply an admin update and persist it.
    ///
    /// Drops the cached bearer token when client_id or client_secret changed,
    /// regardless of how long the token had left.
    pub async fn update_credentials(&self, update: CredentialsUpdate) -> Result<Credentials> {
        let existing = self.credentials().await?;
        let updated = existing.apply(update);

        let value = serde_json::to_value(&updated).map_err(|e| {
            Error::Store(kv_store::Error::Parse(format!("serializing credentials: {e}")))
        })?;
        self.settings.set(CREDENTIALS_KEY, value).await?;

        if existing.auth_changed(&updated) {
            self.cache.delete(TOKEN_CACHE_KEY).await;
            info!(client_id = %updated.client_id, "credentials changed, cached token cleared");
        } else {
            debug!("credentials saved, token unaffected");
        }
        Ok(updated)
    }

    /// Exchange the stored client credentials for a bearer token.
    ///
    /// Does not read or write the cache; see `bearer_token`.
    #[instrument(skip_all)]
    pub async fn authenticate(&self) -> Result<CachedToken> {
        let credentials = self.credentials().await?;
        credentials.require_complete()?;

        let response = self
            .http
            .post(self.url("/authenticate"))
            .timeout(self.options.auth_timeout)
            .json(&AuthenticateRequest {
                client_id: &credentials.client_id,
                client_secret: credentials.client_secret.expose(),
            })
            .send()
            .await
            .map_err(|e| transport("authenticate", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if !status.is_success() {
            warn!(status = status.as_u16(), "authenticate rejected");
            return Err(Error::Auth {
                status: status.as_u16(),
                body,
            });
        }

        let cached = TokenResponse::decode(&body)?.into_cached(Utc::now());
        info!(cache_until = %cached.expires_at, "authenticated with Vouchsafe");
        Ok(cached)
    }

    /// Current bearer token, authenticating on a cache miss.
    pub async fn bearer_token(&self) -> Result<String> {
        if let Some(cached) = self.cached_token().await {
            return Ok(cached.token().to_string());
        }

        // Checked before any network call
        self.credentials().await?.require_complete()?;

        let cached = match self.authenticate().await {
            Ok(cached) => {
                metrics::counter!("vouchsafe_token_refresh_total", "outcome" => "ok").increment(1);
                cached
            }
            Err(e) => {
                metrics::counter!("vouchsafe_token_refresh_total", "outcome" => e.kind())
                    .increment(1);
                return Err(e);
            }
        };
        let ttl = cached.cache_ttl(Utc::now());
        let value = serde_json::to_value(&cached)
            .map_err(|e| Error::Shape(format!("serializing token: {e}")))?;
        self.cache.set(TOKEN_CACHE_KEY, value, ttl).await;
        Ok(cached.token().to_string())
    }

    async fn cached_token(&self) -> Option<CachedToken> {
        let value = self.cache.get(TOKEN_CACHE_KEY).await?;
        match serde_json::from_value::<CachedToken>(value) {
            Ok(cached) if cached.is_valid_at(Utc::now()) => Some(cached),
            Ok(_) => {
                debug!("cached token past its deadline");
                None
            }
            Err(e) => {
                warn!(error = %e, "discarding unreadable cached token");
                self.cache.delete(TOKEN_CACHE_KEY).await;
                None
            }
        }
    }

    /// `GET /flows`
    #[instrument(skip_all)]
    pub async fn list_flows(&self) -> Result<Vec<Flow>> {
        let token = self.bearer_token().await?;
        let response = self
            .http
            .get(self.url("/flows"))
            .bearer_auth(token)
            .timeout(self.options.auth_timeout)
            .send()
            .await
            .map_err(|e| transport("list flows", e))?;

        expect_json(response, "list flows", StatusCode::OK).await
    }

    /// `POST /verifications`
    ///
    /// Fills in the stored default workflow when the payload has none.
    #[instrument(skip_all)]
    pub async fn request_verification(
        &self,
        mut payload: VerificationRequest,
    ) -> Result<VerificationResult> {
        if payload.workflow_id.is_none() {
            payload.workflow_id = self.credentials().await?.workflow_id;
        }

        let token = self.bearer_token().await?;
        let response = self
            .http
            .post(self.url("/verifications"))
            .bearer_auth(token)
            .timeout(self.options.request_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport("create verification", e))?;

        let result: VerificationResult =
            expect_json(response, "create verification", StatusCode::CREATED).await?;
        if result.url.trim().is_empty() {
            return Err(Error::Shape("verification response has an empty url".into()));
        }
        debug!(verification_id = ?result.id, "verification created");
        Ok(result)
    }

    /// `GET /verifications`, newest first.
    #[instrument(skip_all, fields(status = status.unwrap_or("")))]
    pub async fn list_verifications(&self, status: Option<&str>) -> Result<Vec<Verification>> {
        let token = self.bearer_token().await?;
        let mut request = self
            .http
            .get(self.url("/verifications"))
            .bearer_auth(token)
            .timeout(self.options.auth_timeout);
        if let Some(status) = status.filter(|s| !s.is_empty()) {
            request = request.query(&[("status", status)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport("list verifications", e))?;

        let mut rows: Vec<Verification> =
            expect_json(response, "list verifications", StatusCode::OK).await?;
        sort_newest_first(&mut rows);
        Ok(rows)
    }

    /// Admin connection test: list flows and keep them for display.
    ///
    /// A failure clears any previously cached list so stale flows aren't shown
    /// next to an error.
    pub async fn test_connection(&self) -> Result<Vec<Flow>> {
        match self.list_flows().await {
            Ok(flows) => {
                match serde_json::to_value(&flows) {
                    Ok(value) => self.cache.set(FLOWS_CACHE_KEY, value, FLOWS_CACHE_TTL).await,
                    Err(e) => warn!(error = %e, "could not cache flow list"),
                }
                info!(flows = flows.len(), "connection test succeeded");
                Ok(flows)
            }
            Err(e) => {
                self.cache.delete(FLOWS_CACHE_KEY).await;
                warn!(error = %e, "connection test failed");
                Err(e)
            }
        }
    }

    /// Flows cached by the last successful `test_connection`.
    pub async fn cached_flows(&self) -> Option<Vec<Flow>> {
        let value = self.cache.get(FLOWS_CACHE_KEY).await?;
        serde_json::from_value(value).ok()
    }
}

fn transport(operation: &'static str, e: reqwest::Error) -> Error {
    let message = if e.is_timeout() {
        format!("timed out: {e}")
    } else {
        e.to_string()
    };
    Error::Transport { operation, message }
}

/// Check for the expected status, then decode the body as `T`.
async fn expect_json<T: DeserializeOwned>(
    response: reqwest::Response,
    operation: &'static str,
    expected: StatusCode,
) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport(operation, e))?;

    if status != expected {
        return Err(Error::Http {
            operation,
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::Shape(format!("{operation} response: {e}")))
}
