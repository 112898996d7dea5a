use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all royalty analytics metrics
const PREFIX: &str = "royalty";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Insight Provider Metrics
    pub static ref PROVIDER_CALLS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_provider_calls_total"), "Insight provider calls by outcome"),
        &["provider", "status"]
    ).expect("Failed to create provider_calls_total metric");

    pub static ref PROVIDER_CALL_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_provider_call_duration_seconds"),
            "Insight provider call duration in seconds"
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["provider"]
    ).expect("Failed to create provider_call_duration_seconds metric");

    // Pipeline Metrics
    pub static ref RECONCILIATION_RESULTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_reconciliation_results_total"), "Reconciled records by outcome"),
        &["outcome"]
    ).expect("Failed to create reconciliation_results_total metric");

    pub static ref DISCREPANCY_ALERTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_discrepancy_alerts_total"), "Discrepancy alerts raised by kind"),
        &["kind"]
    ).expect("Failed to create discrepancy_alerts_total metric");

    // Error Metrics
    pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_errors_total"), "Total errors by type and endpoint"),
        &["error_type", "endpoint"]
    ).expect("Failed to create errors_total metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(PROVIDER_CALLS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROVIDER_CALL_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(RECONCILIATION_RESULTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(DISCREPANCY_ALERTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ERRORS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record how an insight provider call settled
pub fn record_provider_call(provider: &str, status: &str, duration: Duration) {
    PROVIDER_CALLS_TOTAL
        .with_label_values(&[provider, status])
        .inc();

    PROVIDER_CALL_DURATION_SECONDS
        .with_label_values(&[provider])
        .observe(duration.as_secs_f64());
}

pub fn record_reconciliation_result(outcome: &str) {
    RECONCILIATION_RESULTS_TOTAL
        .with_label_values(&[outcome])
        .inc();
}

pub fn record_discrepancy_alert(kind: &str) {
    DISCREPANCY_ALERTS_TOTAL.with_label_values(&[kind]).inc();
}

/// Record an error
pub fn record_error(error_type: &str, endpoint: &str) {
    ERRORS_TOTAL
        .with_label_values(&[error_type, endpoint])
        .inc();
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    // RSS is reported in kB
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<f64>() {
                            PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
