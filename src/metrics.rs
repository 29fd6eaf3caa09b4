//! Request metrics: three path-labeled instruments exposed over the
//! Prometheus exporter.

use ::metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use anyhow::Result;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

/// Prometheus default histogram bucket boundaries, in seconds.
const DEFAULT_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and exporter, then register the
/// gateway instruments. Call once at startup.
pub fn init() -> Result<()> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("request_duration_seconds".to_string()),
            DEFAULT_BUCKETS,
        )?
        .install()?;

    describe_counter!("request_total", "Total number of requests");
    describe_counter!("error_request_total", "Total number of error requests");
    describe_histogram!(
        "request_duration_seconds",
        Unit::Seconds,
        "Duration of request"
    );

    Ok(())
}

/// Count a handled request.
pub fn record_request(path: &str) {
    counter!("request_total", "path" => path.to_string()).increment(1);
}

/// Count a request that ended in an error response.
pub fn record_error(path: &str) {
    counter!("error_request_total", "path" => path.to_string()).increment(1);
}

/// Record how long a request took, in seconds.
pub fn observe_duration(path: &str, seconds: f64) {
    histogram!("request_duration_seconds", "path" => path.to_string()).record(seconds);
}
