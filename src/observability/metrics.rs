use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// ---------------------------------------------------------------------------
// Metrics catalog
// ---------------------------------------------------------------------------

pub const REQUESTS_TOTAL: &str = "upload_proxy_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "upload_proxy_request_duration_seconds";

/// Register all metric descriptors at startup.
pub fn describe_all_metrics() {
    describe_counter!(
        REQUESTS_TOTAL,
        "Upload and delete requests by operation and outcome"
    );
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Time spent in the object store per request"
    );
}

// ---------------------------------------------------------------------------
// Recording helpers
// ---------------------------------------------------------------------------

pub fn outcome_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

pub fn record_request(operation: &'static str, success: bool, elapsed: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "operation" => operation,
        "outcome" => outcome_label(success)
    )
    .increment(1);
    histogram!(REQUEST_DURATION_SECONDS, "operation" => operation).record(elapsed.as_secs_f64());
}

// ---------------------------------------------------------------------------
// Prometheus exporter
// ---------------------------------------------------------------------------

/// Install the Prometheus recorder and serve `/metrics` on `port`.
///
/// Must be called from within a tokio runtime. The listener is separate from
/// the proxy port so it never shadows an object key.
pub fn install_prometheus_exporter(port: u16) -> Result<SocketAddr, BuildError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_all_metrics();
    Ok(addr)
}
