//! Fake data source and forward target

use super::constants::*;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Default)]
struct Recorded {
    queries: Vec<BTreeMap<String, String>>,
    forwarded: Vec<JsonValue>,
}

type Shared = Arc<Mutex<Recorded>>;

/// Serves fixed responses on [`FUNDS_PATH`], [`BROKEN_PATH`], [`SINK_PATH`]
/// and [`REJECTING_SINK_PATH`] and records what it receives.
pub struct TestUpstream {
    pub base_url: String,
    recorded: Shared,
    _shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

pub fn sample_funds() -> JsonValue {
    json!({
        "items": [
            {
                "regNo": "11315",
                "name": "Sample Fixed Income Fund",
                "fundType": 4,
                "fundSize": 1,
                "initiationDate": "2012-03-17T00:00:00",
                "annualEfficiency": 21.5,
                "netAsset": 125000000,
                "date": "2024-05-01T00:00:00",
                "manager": "Sample Asset Management",
                "websiteAddress": ["https://fund.example.com", "https://backup.example.com"]
            }
        ]
    })
}

async fn funds(
    State(recorded): State<Shared>,
    Query(query): Query<BTreeMap<String, String>>,
) -> Json<JsonValue> {
    recorded.lock().unwrap().queries.push(query);
    Json(sample_funds())
}

async fn broken() -> (StatusCode, Json<JsonValue>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"detail": "boom"})),
    )
}

async fn sink(State(recorded): State<Shared>, Json(body): Json<JsonValue>) -> StatusCode {
    recorded.lock().unwrap().forwarded.push(body);
    StatusCode::OK
}

async fn rejecting_sink() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

impl TestUpstream {
    pub async fn spawn() -> Self {
        let recorded = Shared::default();
        let app = Router::new()
            .route(FUNDS_PATH, get(funds))
            .route(BROKEN_PATH, get(broken))
            .route(SINK_PATH, post(sink))
            .route(REJECTING_SINK_PATH, post(rejecting_sink))
            .with_state(recorded.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind upstream");
        let addr = listener.local_addr().expect("Failed to get upstream address");
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Upstream failed");
        });

        Self {
            base_url: format!("http://{}", addr),
            recorded,
            _shutdown_tx: shutdown_tx,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Query strings received on [`FUNDS_PATH`], oldest first.
    pub fn fund_queries(&self) -> Vec<BTreeMap<String, String>> {
        self.recorded.lock().unwrap().queries.clone()
    }

    /// Payloads accepted by [`SINK_PATH`], oldest first.
    pub fn forwarded(&self) -> Vec<JsonValue> {
        self.recorded.lock().unwrap().forwarded.clone()
    }

    /// A config with a single fast-failing job polling `path`.
    pub fn single_job_config(&self, path: &str) -> String {
        format!(
            r#"
            logging_level = "none"

            [[apis]]
            name = "single"
            url = "{}"
            interval_seconds = 3600
            max_retries = 1
            retry_backoff_seconds = 0
            timeout_seconds = 2
            "#,
            self.url(path)
        )
    }
}
