use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all FinData metrics
const PREFIX: &str = "findata";

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

    // Job Metrics
    pub static ref JOB_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_job_runs_total"), "Total job runs by trigger and outcome"),
        &["job", "trigger", "status"]
    ).expect("Failed to create job_runs_total metric");

    pub static ref JOB_RUN_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_job_run_duration_seconds"),
            "Duration of a full fetch/transform/forward run in seconds"
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["job", "trigger"]
    ).expect("Failed to create job_run_duration_seconds metric");

    pub static ref FETCH_ATTEMPTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_fetch_attempts_total"), "Total fetch attempts by outcome"),
        &["job", "outcome"]
    ).expect("Failed to create fetch_attempts_total metric");

    pub static ref FORWARD_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_forward_total"), "Total forward requests by outcome"),
        &["job", "status"]
    ).expect("Failed to create forward_total metric");

    pub static ref JOBS_RUNNING: Gauge = Gauge::new(
        format!("{PREFIX}_jobs_running"),
        "Number of scheduler loops currently running"
    ).expect("Failed to create jobs_running metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(JOB_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(JOB_RUN_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(FETCH_ATTEMPTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(FORWARD_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(JOBS_RUNNING.clone()));

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

/// Record a finished job run.
pub fn record_job_run(job: &str, trigger: &str, status: &str, duration: Duration) {
    JOB_RUNS_TOTAL
        .with_label_values(&[job, trigger, status])
        .inc();

    JOB_RUN_DURATION_SECONDS
        .with_label_values(&[job, trigger])
        .observe(duration.as_secs_f64());
}

pub fn record_fetch_attempt(job: &str, outcome: &str) {
    FETCH_ATTEMPTS_TOTAL
        .with_label_values(&[job, outcome])
        .inc();
}

pub fn record_forward(job: &str, status: &str) {
    FORWARD_TOTAL.with_label_values(&[job, status]).inc();
}

pub fn set_jobs_running(count: usize) {
    JOBS_RUNNING.set(count as f64);
}

/// Collapse job-specific paths so metric labels stay bounded.
pub fn categorize_endpoint(path: &str) -> String {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["jobs", "run-all"] => "/jobs/run-all".to_string(),
        ["jobs", _, "run-once"] => "/jobs/{name}/run-once".to_string(),
        ["jobs", _] => "/jobs/{name}".to_string(),
        _ => path.to_string(),
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
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
