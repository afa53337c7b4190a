use super::fetcher::{FetchRequest, RetryExecutor};
use super::forwarder::Forwarder;
use super::job::{JobDescriptor, JobError, QueryParams};
use super::status::JobStatusTracker;
use super::transform::TransformRegistry;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Schedule,
    Manual,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Schedule => "schedule",
            Trigger::Manual => "manual",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resources shared by every scheduler loop and on-demand trigger.
///
/// Cloning is cheap: the HTTP client is pooled and reference counted, and the
/// registry and tracker are behind `Arc`s.
#[derive(Clone)]
pub struct JobContext {
    pub executor: RetryExecutor,
    pub forwarder: Forwarder,
    pub transforms: Arc<TransformRegistry>,
    pub status: JobStatusTracker,
}

impl JobContext {
    pub fn new(client: reqwest::Client, transforms: TransformRegistry) -> Self {
        Self {
            executor: RetryExecutor::new(client.clone()),
            forwarder: Forwarder::new(client),
            transforms: Arc::new(transforms),
            status: JobStatusTracker::new(),
        }
    }

    /// Fetch with retries, no transform or forward.
    pub async fn fetch(
        &self,
        job: &JobDescriptor,
        extra_params: Option<&QueryParams>,
        cancel: Option<&CancellationToken>,
    ) -> Result<JsonValue, JobError> {
        self.executor
            .fetch_with_retry(&FetchRequest::for_job(job, extra_params), cancel)
            .await
    }

    /// One full run: fetch, apply the registered transform, forward if configured.
    ///
    /// Does not touch job status; callers decide what to record.
    pub async fn execute_run(
        &self,
        job: &JobDescriptor,
        extra_params: Option<&QueryParams>,
        trigger: Trigger,
        cancel: Option<&CancellationToken>,
    ) -> Result<JsonValue, JobError> {
        let data = self.fetch(job, extra_params, cancel).await?;

        let payload = match self.transforms.get(&job.name) {
            Some(transform) => {
                transform(data).map_err(|e| JobError::TransformFailed(e.to_string()))?
            }
            None => data,
        };

        debug!(
            "Payload for API '{}' ({} run): {}",
            job.name, trigger, payload
        );

        if let Some(target_url) = &job.target_url {
            self.forwarder
                .forward(&job.name, target_url, &payload, job.timeout)
                .await?;
        }

        Ok(payload)
    }
}
