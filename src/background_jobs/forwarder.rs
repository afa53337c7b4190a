use super::job::{AttemptError, JobError};
use crate::server::metrics;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, warn};

/// Delivers processed payloads to a job's target URL. Never retried.
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// POST `payload` as JSON to `target_url`. Any non-2xx status is a failure.
    pub async fn forward(
        &self,
        job_name: &str,
        target_url: &str,
        payload: &JsonValue,
        timeout: Duration,
    ) -> Result<(), JobError> {
        let result = self.send(target_url, payload, timeout).await;
        match &result {
            Ok(()) => {
                metrics::record_forward(job_name, "success");
                debug!("Forwarded payload of '{}' to {}", job_name, target_url);
            }
            Err(e) => {
                metrics::record_forward(job_name, "failure");
                warn!("Forwarding '{}' to {} failed: {}", job_name, target_url, e);
            }
        }
        result.map_err(JobError::ForwardFailed)
    }

    async fn send(
        &self,
        target_url: &str,
        payload: &JsonValue,
        timeout: Duration,
    ) -> Result<(), AttemptError> {
        let response = self
            .client
            .post(target_url)
            .json(payload)
            .timeout(timeout)
            .send()
            .await
            .map_err(AttemptError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }
        Ok(())
    }
}
