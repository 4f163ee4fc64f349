//! Admin API for settings and verification records
//!
//! Runs on a separate listener port (default 9090) and must not be exposed
//! publicly; it carries no authentication of its own. Error bodies here carry
//! the raw upstream message, unlike the public endpoint.
//!
//! Endpoints:
//! - GET  /admin/settings         - stored client_id / workflow_id, whether a secret is set
//! - PUT  /admin/settings         - partial credentials update
//! - POST /admin/test-connection  - list flows with the stored credentials
//! - GET  /admin/flows            - flows cached by the last successful test
//! - GET  /admin/verifications    - recent verifications, optional `?status=`
//! - GET  /metrics                - Prometheus text format

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use vouchsafe_api::{Credentials, CredentialsUpdate, KNOWN_STATUSES, Verification, VouchsafeClient};

/// Rows returned by the verifications list.
pub const LIST_LIMIT: usize = 50;

/// Shared state for admin API handlers.
#[derive(Clone)]
pub struct AdminState {
    client: Arc<VouchsafeClient>,
    dashboard_url: Arc<str>,
    prometheus: PrometheusHandle,
}

impl AdminState {
    pub fn new(client: Arc<VouchsafeClient>, dashboard_url: &str, prometheus: PrometheusHandle) -> Self {
        Self {
            client,
            dashboard_url: Arc::from(dashboard_url.trim_end_matches('/')),
            prometheus,
        }
    }
}

/// Build the admin axum router.
pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/settings", get(get_settings).put(put_settings))
        .route("/admin/test-connection", post(test_connection))
        .route("/admin/flows", get(cached_flows))
        .route("/admin/verifications", get(list_verifications))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

fn json_response(status: StatusCode, body: Value) -> Response {
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    json_response(status, json!({ "error": message.to_string() }))
}

/// The secret is reduced to a flag.
fn settings_view(credentials: &Credentials) -> Value {
    json!({
        "client_id": credentials.client_id,
        "workflow_id": credentials.workflow_id,
        "client_secret_set": !credentials.client_secret.is_empty(),
    })
}

/// GET /admin/settings
async fn get_settings(State(state): State<AdminState>) -> Response {
    match state.client.credentials().await {
        Ok(credentials) => json_response(StatusCode::OK, settings_view(&credentials)),
        Err(e) => {
            warn!(error = %e, "failed to read settings");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// PUT /admin/settings: absent fields are unchanged, a blank secret keeps the stored one.
async fn put_settings(
    State(state): State<AdminState>,
    axum::Json(update): axum::Json<CredentialsUpdate>,
) -> Response {
    match state.client.update_credentials(update).await {
        Ok(credentials) => {
            info!(client_id = %credentials.client_id, "settings updated");
            json_response(StatusCode::OK, settings_view(&credentials))
        }
        Err(e) => {
            warn!(error = %e, "failed to save settings");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// POST /admin/test-connection
async fn test_connection(State(state): State<AdminState>) -> Response {
    match state.client.test_connection().await {
        Ok(flows) => json_response(StatusCode::OK, json!({ "status": "ok", "flows": flows })),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e),
    }
}

/// GET /admin/flows
async fn cached_flows(State(state): State<AdminState>) -> Response {
    let flows = state.client.cached_flows().await.unwrap_or_default();
    json_response(StatusCode::OK, json!(flows))
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    status: Option<String>,
}

/// `{dashboard}/admin/teams/{team}/{kind}/{id}` with each segment percent-encoded.
fn dashboard_link(dashboard_url: &str, team: &str, kind: &str, id: &str) -> Option<String> {
    if team.is_empty() || id.is_empty() {
        return None;
    }
    let mut url = Url::parse(dashboard_url).ok()?;
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(["admin", "teams", team, kind, id]);
    Some(url.into())
}

fn verification_row(
    row: &Verification,
    workflow_names: &HashMap<String, String>,
    dashboard_url: &str,
    team: &str,
) -> Value {
    let workflow_name = row
        .workflow_id
        .as_ref()
        .map(|id| workflow_names.get(id).unwrap_or(id).clone());
    let case_url = row
        .id
        .as_deref()
        .and_then(|id| dashboard_link(dashboard_url, team, "cases", id));
    let workflow_url = row
        .workflow_id
        .as_deref()
        .and_then(|id| dashboard_link(dashboard_url, team, "builder", id));

    json!({
        "id": row.id,
        "status": row.status,
        "email": row.email,
        "workflow_id": row.workflow_id,
        "workflow_name": workflow_name,
        "created_at": row.created_at,
        "case_url": case_url,
        "workflow_url": workflow_url,
    })
}

/// GET /admin/verifications?status=
///
/// Newest first, capped at `LIST_LIMIT`. Workflow names come from a live
/// flows call; if that fails the rows fall back to workflow ids.
async fn list_verifications(
    State(state): State<AdminState>,
    Query(query): Query<ListQuery>,
) -> Response {
    let status = query.status.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if let Some(status) = status.filter(|s| !KNOWN_STATUSES.contains(s)) {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("unknown status {status:?}, expected one of {}", KNOWN_STATUSES.join(", ")),
        );
    }

    let rows = match state.client.list_verifications(status).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, "failed to list verifications");
            return error_response(StatusCode::BAD_GATEWAY, e);
        }
    };

    let workflow_names: HashMap<String, String> = match state.client.list_flows().await {
        Ok(flows) => flows
            .iter()
            .map(|f| (f.id.clone(), f.display_name().to_owned()))
            .collect(),
        Err(e) => {
            warn!(error = %e, "flows unavailable, showing workflow ids");
            HashMap::new()
        }
    };

    let team = match state.client.credentials().await {
        Ok(credentials) => credentials.client_id,
        Err(e) => {
            warn!(error = %e, "credentials unavailable, omitting dashboard links");
            String::new()
        }
    };

    let total = rows.len();
    let verifications: Vec<Value> = rows
        .iter()
        .take(LIST_LIMIT)
        .map(|row| verification_row(row, &workflow_names, &state.dashboard_url, &team))
        .collect();

    json_response(
        StatusCode::OK,
        json!({
            "verifications": verifications,
            "total": total,
            "limit": LIST_LIMIT,
            "status": status,
        }),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AdminState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}
