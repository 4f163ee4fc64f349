//! Public verification request endpoint
//!
//! `GET /vouchsafe/request?email=...` validates the query, creates a hosted
//! verification, and answers with a 302 into it. On any failure the caller's
//! `fallback` URL (when usable) wins over the error page, so a storefront can
//! keep its customer on its own site.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use tracing::{error, info, instrument, warn};
use vouchsafe_api::{VerificationRequest, VouchsafeClient};

use crate::error::{Error, Result};
use crate::metrics::{self, Outcome};
use crate::validation::{sanitize_redirect, sanitize_url, validate_email};

/// Shared state passed to the endpoint handler via axum State extractor
#[derive(Clone)]
pub struct EndpointState {
    pub client: Arc<VouchsafeClient>,
    /// Lowercased hosts a fallback may point at; empty allows any
    pub allowed_redirect_hosts: Arc<Vec<String>>,
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
}

fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_owned())]).into_response()
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Minimal HTML page for end users who have nowhere else to go.
fn error_page(status: StatusCode, message: &str) -> Response {
    let body = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Verification Error</title></head>\n<body><h1>Verification Error</h1><p>{}</p></body>\n</html>\n",
        escape_html(message)
    );
    (status, Html(body)).into_response()
}

/// Turn the query string into a verification payload.
///
/// Only `email` is required. Optional claims are opaque: trimmed and otherwise
/// passed through untouched. Blank ones are left out so the API never sees
/// empty strings.
pub fn build_payload(params: &HashMap<String, String>) -> Result<VerificationRequest> {
    let email = params.get("email").map(|e| e.trim()).unwrap_or_default();
    validate_email(email).map_err(Error::InvalidEmail)?;

    let claim = |key: &str| {
        params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    };

    let redirect_url = params
        .get("redirect_url")
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| {
            let url = sanitize_url(raw);
            if url.is_none() {
                warn!(redirect_url = %raw, "dropping redirect_url that is not an http(s) URL");
            }
            url
        });

    Ok(VerificationRequest {
        email: email.to_owned(),
        first_name: claim("first_name"),
        last_name: claim("last_name"),
        street_address: claim("street_address"),
        postcode: claim("postcode"),
        date_of_birth: claim("date_of_birth"),
        workflow_id: claim("workflow_id"),
        external_id: claim("external_id"),
        redirect_url,
        expires_at: claim("expires_at"),
    })
}

async fn create_verification(state: &EndpointState, params: &HashMap<String, String>) -> Result<String> {
    let payload = build_payload(params)?;
    let result = state.client.request_verification(payload).await?;
    sanitize_url(&result.url).ok_or(Error::BadVerificationUrl(result.url))
}

/// Handle one public request. Always answers with a redirect or an HTML page.
#[instrument(skip_all, fields(request_id = %request_id))]
pub async fn start_verification(
    state: &EndpointState,
    params: HashMap<String, String>,
    request_id: String,
) -> Response {
    let started = Instant::now();
    state.requests_total.fetch_add(1, Ordering::Relaxed);

    let fallback = params.get("fallback").and_then(|raw| {
        let url = sanitize_redirect(raw, &state.allowed_redirect_hosts);
        if url.is_none() && !raw.trim().is_empty() {
            warn!(fallback = %raw, "ignoring fallback that is not an allowed http(s) URL");
        }
        url
    });

    let (outcome, response) = match create_verification(state, &params).await {
        Ok(url) => {
            info!("redirecting to hosted verification");
            (Outcome::Redirect, redirect(&url))
        }
        Err(e) => {
            let invalid = matches!(e, Error::InvalidEmail(_));
            match &e {
                Error::InvalidEmail(reason) => info!(reason = %reason, "rejected request"),
                Error::Upstream(api) => {
                    metrics::record_api_error(api.kind());
                    error!(error = %api, "could not create verification");
                }
                Error::BadVerificationUrl(_) => {
                    metrics::record_api_error("shape");
                    error!(error = %e, "could not create verification");
                }
            }
            if !invalid {
                state.errors_total.fetch_add(1, Ordering::Relaxed);
            }

            match fallback {
                Some(url) => (Outcome::Fallback, redirect(&url)),
                None if invalid => (Outcome::Invalid, error_page(e.status(), e.user_message())),
                None => (Outcome::Error, error_page(e.status(), e.user_message())),
            }
        }
    };

    metrics::record_request(outcome, started.elapsed().as_secs_f64());
    response
}
