//! In-process stand-in for the Vouchsafe API, shared by the handler tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use kv_store::{MemoryCache, MemorySettingsStore, SettingsStore};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use vouchsafe_api::{CREDENTIALS_KEY, ClientOptions, VouchsafeClient};

/// Canned responses per endpoint plus recorded calls.
#[derive(Clone)]
pub struct MockApi {
    pub auth_calls: Arc<AtomicUsize>,
    pub flows: (u16, Value),
    pub create: (u16, Value),
    pub created_bodies: Arc<Mutex<Vec<Value>>>,
    pub list: (u16, Value),
}

impl Default for MockApi {
    fn default() -> Self {
        Self {
            auth_calls: Arc::new(AtomicUsize::new(0)),
            flows: (200, json!([{"id": "w1", "name": "Basic KYC"}])),
            create: (
                201,
                json!({"id": "v1", "url": "https://verify.test/v1", "expires_at": "2026-01-01T00:00:00Z"}),
            ),
            created_bodies: Arc::new(Mutex::new(Vec::new())),
            list: (200, json!([])),
        }
    }
}

fn reply(canned: &(u16, Value)) -> axum::response::Response {
    let (status, body) = canned.clone();
    (StatusCode::from_u16(status).unwrap(), Json(body)).into_response()
}

/// Serve `mock` on an ephemeral port and return its base URL.
pub async fn start_mock_api(mock: MockApi) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = axum::Router::new()
        .route(
            "/authenticate",
            post(|State(m): State<MockApi>| async move {
                let n = m.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
                let expires = chrono::Utc::now() + chrono::Duration::hours(1);
                (
                    StatusCode::CREATED,
                    Json(json!({"access_token": format!("tok-{n}"), "expires_at": expires.to_rfc3339()})),
                )
            }),
        )
        .route(
            "/flows",
            get(|State(m): State<MockApi>| async move { reply(&m.flows) }),
        )
        .route(
            "/verifications",
            post(|State(m): State<MockApi>, Json(body): Json<Value>| async move {
                m.created_bodies.lock().unwrap().push(body);
                reply(&m.create)
            })
            .get(
                |State(m): State<MockApi>, Query(_q): Query<HashMap<String, String>>| async move {
                    reply(&m.list)
                },
            ),
        )
        .with_state(mock);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Stored credentials for `team-1` with default workflow `w1`.
pub fn complete_credentials() -> Value {
    json!({"client_id": "team-1", "client_secret": "secret", "workflow_id": "w1"})
}

/// Client against `base_url` backed by in-memory stores.
pub async fn test_client(base_url: String, credentials: Option<Value>) -> Arc<VouchsafeClient> {
    let settings = Arc::new(MemorySettingsStore::new());
    if let Some(credentials) = credentials {
        settings.set(CREDENTIALS_KEY, credentials).await.unwrap();
    }
    Arc::new(VouchsafeClient::new(
        reqwest::Client::new(),
        ClientOptions {
            base_url,
            auth_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
        },
        settings,
        Arc::new(MemoryCache::new()),
    ))
}

/// Read a response body as UTF-8.
pub async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
