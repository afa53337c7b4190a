//! Test server lifecycle management
//!
//! Each test gets an isolated application built from its own config file,
//! with the scheduler running and the API bound to a random port.

use super::constants::*;
use findata_server::background_jobs::{
    create_scheduler, JobContext, JobRegistry, JobScheduler, TransformRegistry,
};
use findata_server::config::{AppConfig, CliConfig, FileConfig};
use findata_server::server::{make_app, ServerConfig};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Running application under test
///
/// When dropped, the scheduler loops and the HTTP server are cancelled and
/// the temporary config directory is removed.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    pub client: reqwest::Client,

    scheduler: Option<JobScheduler>,
    shutdown_token: CancellationToken,
    _temp_config_dir: TempDir,
}

impl TestServer {
    /// Writes `config_toml` to a temporary file, loads it the same way the
    /// binary does, starts every enabled job and serves the API.
    ///
    /// # Panics
    ///
    /// Panics if the config is invalid or the server doesn't become ready.
    pub async fn spawn(config_toml: &str) -> Self {
        let temp_config_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_config_dir.path().join("config.toml");
        std::fs::write(&config_path, config_toml).expect("Failed to write config");

        let file_config = FileConfig::load(&config_path).expect("Failed to load config");
        let app_config =
            AppConfig::resolve(&CliConfig::default(), file_config).expect("Invalid config");

        let shutdown_token = CancellationToken::new();
        let context = JobContext::new(reqwest::Client::new(), TransformRegistry::with_builtin());
        let (mut scheduler, scheduler_handle) = create_scheduler(
            Arc::new(JobRegistry::new(app_config.jobs)),
            context,
            shutdown_token.child_token(),
        );
        scheduler.start();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            requests_logging_level: app_config.logging_level,
            port,
            ..ServerConfig::default()
        };
        let app = make_app(config, scheduler_handle);

        let server_token = shutdown_token.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(server_token.cancelled_owned())
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to build reqwest client"),
            scheduler: Some(scheduler),
            shutdown_token,
            _temp_config_dir: temp_config_dir,
        };

        server.wait_for_ready().await;
        server
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get_json(&self, path: &str) -> (reqwest::StatusCode, JsonValue) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    pub async fn post_json(&self, path: &str) -> (reqwest::StatusCode, JsonValue) {
        let response = self.client.post(self.url(path)).send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    /// Polls `GET /jobs/{name}` until `predicate` accepts the job info.
    pub async fn wait_for_job<F>(&self, name: &str, predicate: F) -> JsonValue
    where
        F: Fn(&JsonValue) -> bool,
    {
        let start = Instant::now();
        loop {
            let (status, body) = self.get_json(&format!("/jobs/{}", name)).await;
            if status.is_success() && predicate(&body) {
                return body;
            }
            if start.elapsed() > Duration::from_millis(STATUS_WAIT_TIMEOUT_MS) {
                panic!("Job '{}' did not reach the expected state: {}", name, body);
            }
            tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
        }
    }

    /// Stops the scheduler loops and waits for them to finish.
    pub async fn shutdown(mut self) {
        self.shutdown_token.cancel();
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop().await;
        }
    }

    async fn wait_for_ready(&self) {
        let start = Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match self.client.get(self.url("/health")).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}
