//! Prometheus metrics exposition
//!
//! - `vouchsafe_requests_total` (counter): label `outcome`
//! - `vouchsafe_request_duration_seconds` (histogram): label `outcome`
//! - `vouchsafe_api_errors_total` (counter): label `error_type`
//! - `vouchsafe_token_refresh_total` (counter, emitted by the API client): label `outcome`

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "vouchsafe_request_duration_seconds";

/// Bucket boundaries from 5ms up to the 20s verification timeout.
const DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0];

/// How a request to the public endpoint ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Sent to the hosted verification
    Redirect,
    /// Failed, sent to the caller's fallback URL
    Fallback,
    /// Bad input, error page
    Invalid,
    /// Upstream failure, error page
    Error,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Outcome::Redirect => "redirect",
            Outcome::Fallback => "fallback",
            Outcome::Invalid => "invalid",
            Outcome::Error => "error",
        }
    }
}

/// In-process counters reported by `/health`.
#[derive(Debug, Clone)]
pub struct ServiceMetrics {
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            errors_total: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    Ok(builder()?.install_recorder()?)
}

/// A handle whose recorder is not installed globally.
#[cfg(test)]
pub fn build_handle() -> anyhow::Result<PrometheusHandle> {
    Ok(builder()?.build_recorder().handle())
}

/// Record a finished endpoint request.
pub fn record_request(outcome: Outcome, duration_secs: f64) {
    metrics::counter!("vouchsafe_requests_total", "outcome" => outcome.label()).increment(1);
    metrics::histogram!(DURATION_METRIC, "outcome" => outcome.label()).record(duration_secs);
}

/// Record a failed Vouchsafe API call by error kind.
pub fn record_api_error(error_type: &'static str) {
    metrics::counter!("vouchsafe_api_errors_total", "error_type" => error_type).increment(1);
}
