//! Scripted local HTTP server used by the background job tests.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
pub struct Scripted {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl Scripted {
    pub fn json(status: u16, body: JsonValue) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub query: BTreeMap<String, String>,
    pub body: Option<JsonValue>,
    pub at: Instant,
}

#[derive(Default)]
struct UpstreamState {
    queued: Mutex<HashMap<String, VecDeque<Scripted>>>,
    fallback: Mutex<HashMap<String, Scripted>>,
    hits: Mutex<HashMap<String, Vec<RecordedRequest>>>,
}

pub struct TestUpstream {
    pub base_url: String,
    state: Arc<UpstreamState>,
    _shutdown_tx: oneshot::Sender<()>,
}

impl TestUpstream {
    pub async fn spawn() -> Self {
        let state = Arc::new(UpstreamState::default());
        let app = Router::new()
            .fallback(handle_request)
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
            _shutdown_tx: shutdown_tx,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Queue responses served in order, before falling back to `respond_always`.
    pub fn queue(&self, path: &str, responses: Vec<Scripted>) {
        self.state
            .queued
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .extend(responses);
    }

    pub fn respond_always(&self, path: &str, response: Scripted) {
        self.state
            .fallback
            .lock()
            .unwrap()
            .insert(path.to_string(), response);
    }

    pub fn hits(&self, path: &str) -> Vec<RecordedRequest> {
        self.state
            .hits
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn hit_count(&self, path: &str) -> usize {
        self.hits(path).len()
    }
}

async fn handle_request(
    State(state): State<Arc<UpstreamState>>,
    method: Method,
    uri: Uri,
    Query(query): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let body = serde_json::from_slice::<JsonValue>(&body).ok();

    state
        .hits
        .lock()
        .unwrap()
        .entry(path.clone())
        .or_default()
        .push(RecordedRequest {
            method,
            query,
            body,
            at: Instant::now(),
        });

    let scripted = {
        let queued = state
            .queued
            .lock()
            .unwrap()
            .get_mut(&path)
            .and_then(|q| q.pop_front());
        queued.or_else(|| state.fallback.lock().unwrap().get(&path).cloned())
    };

    let Some(scripted) = scripted else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if !scripted.delay.is_zero() {
        tokio::time::sleep(scripted.delay).await;
    }

    let status = StatusCode::from_u16(scripted.status).unwrap();
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        scripted.body,
    )
        .into_response()
}
