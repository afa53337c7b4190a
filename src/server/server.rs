use super::metrics::metrics_handler;
use super::state::ServerState;
use super::{log_requests, ServerConfig};
use crate::background_jobs::{JobError, JobInfo, JobRunReport, QueryParams, SchedulerHandle};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Serialize)]
struct HomeResponse {
    message: &'static str,
    status: &'static str,
    uptime: String,
}

#[derive(Serialize)]
struct RunAllResponse {
    results: Vec<JobRunReport>,
}

fn format_uptime(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    if days > 0 {
        format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl IntoResponse for JobError {
    fn into_response(self) -> Response {
        let status = match &self {
            JobError::JobNotFound(_) => StatusCode::NOT_FOUND,
            JobError::FetchExhausted { .. }
            | JobError::ForwardFailed(_)
            | JobError::TransformFailed(_) => StatusCode::BAD_GATEWAY,
        };
        error_response(status, self.to_string())
    }
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    Json(HomeResponse {
        message: "Service is up",
        status: "ok",
        uptime: format_uptime(state.start_time.elapsed()),
    })
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_jobs(State(handle): State<SchedulerHandle>) -> Json<Vec<JobInfo>> {
    Json(handle.list_jobs())
}

async fn get_job(State(handle): State<SchedulerHandle>, Path(name): Path<String>) -> Response {
    match handle.get_job(&name) {
        Some(info) => Json(info).into_response(),
        None => JobError::JobNotFound(name).into_response(),
    }
}

async fn run_job_once(
    State(handle): State<SchedulerHandle>,
    Path(name): Path<String>,
    Query(params): Query<QueryParams>,
) -> Response {
    match handle.run_once(&name, &params).await {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn run_all_jobs(State(handle): State<SchedulerHandle>) -> Json<RunAllResponse> {
    Json(RunAllResponse {
        results: handle.run_all_once().await,
    })
}

pub fn make_app(config: ServerConfig, scheduler_handle: SchedulerHandle) -> Router {
    let state = ServerState {
        config,
        start_time: Instant::now(),
        scheduler_handle,
    };

    let job_routes: Router<ServerState> = Router::new()
        .route("/", get(list_jobs))
        .route("/run-all", post(run_all_jobs))
        .route("/{name}", get(get_job))
        .route("/{name}/run-once", post(run_job_once));

    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .nest("/jobs", job_routes)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .with_state(state)
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serve the API and the metrics endpoint until `shutdown_token` is cancelled.
pub async fn run_server(
    config: ServerConfig,
    scheduler_handle: SchedulerHandle,
    shutdown_token: CancellationToken,
) -> Result<()> {
    let addr = format!("{}:{}", config.bind_address, config.port);
    let metrics_addr = format!("{}:{}", config.bind_address, config.metrics_port);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let metrics_listener = TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("Failed to bind metrics server on {}", metrics_addr))?;

    let metrics_token = shutdown_token.clone();
    let metrics_server = tokio::spawn(async move {
        axum::serve(metrics_listener, make_metrics_app())
            .with_graceful_shutdown(metrics_token.cancelled_owned())
            .await
    });

    info!("Ready to serve at {}!", addr);
    info!("Metrics available at {}!", metrics_addr);

    let app = make_app(config, scheduler_handle);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_token.cancelled_owned())
        .await
        .context("HTTP server failed")?;

    metrics_server
        .await
        .context("Metrics server task failed")?
        .context("Metrics server failed")?;

    info!("HTTP servers stopped");
    Ok(())
}
