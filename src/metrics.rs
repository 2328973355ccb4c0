#[cfg(feature = "server")]
use axum::{http::StatusCode, response::IntoResponse};
#[cfg(feature = "server")]
use metrics::{counter, histogram};
#[cfg(feature = "server")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
#[cfg(feature = "server")]
use std::sync::OnceLock;
#[cfg(feature = "server")]
use tracing::warn;

#[cfg(feature = "server")]
use crate::types::LookupKind;

#[cfg(feature = "server")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

#[cfg(feature = "server")]
pub fn init_metrics() {
    if PROMETHEUS_HANDLE.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = PROMETHEUS_HANDLE.set(handle);

            // Initialize metrics with zero values
            counter!("domain_intel_requests_total", "tld" => "unknown").absolute(0);
            counter!("domain_intel_cache_hits_total").absolute(0);
            counter!("domain_intel_cache_misses_total").absolute(0);
            counter!("domain_intel_errors_total", "error_type" => "unknown").absolute(0);
            counter!("domain_intel_partial_failures_total", "lookup" => "unknown").absolute(0);
            histogram!("domain_intel_request_duration_seconds").record(0.0);
        }
        Err(e) => {
            warn!("Failed to install metrics recorder: {}", e);
        }
    }
}

#[cfg(feature = "server")]
pub fn increment_requests(domain: &str) {
    let tld = extract_tld(domain);
    counter!("domain_intel_requests_total", "tld" => tld).increment(1);
}

#[cfg(feature = "server")]
pub fn increment_cache_hits() {
    counter!("domain_intel_cache_hits_total").increment(1);
}

#[cfg(feature = "server")]
pub fn increment_cache_misses() {
    counter!("domain_intel_cache_misses_total").increment(1);
}

#[cfg(feature = "server")]
pub fn increment_errors(error_type: &str) {
    counter!("domain_intel_errors_total", "error_type" => error_type.to_string()).increment(1);
}

#[cfg(feature = "server")]
pub fn increment_partial_failures(kind: LookupKind) {
    counter!("domain_intel_partial_failures_total", "lookup" => kind.as_str()).increment(1);
}

#[cfg(feature = "server")]
pub fn record_query_time(duration_ms: u64) {
    let duration_seconds = duration_ms as f64 / 1000.0;
    histogram!("domain_intel_request_duration_seconds").record(duration_seconds);
}

#[cfg(feature = "server")]
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics not initialized".to_string(),
        ),
    }
}

#[cfg(feature = "server")]
fn extract_tld(domain: &str) -> String {
    domain
        .trim_end_matches('.')
        .rsplit('.')
        .next()
        .filter(|label| !label.is_empty())
        .unwrap_or("unknown")
        .to_lowercase()
}
