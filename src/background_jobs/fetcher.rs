//! Bounded-retry fetching of source data.

use super::job::{AttemptError, JobDescriptor, JobError, QueryParams};
use crate::server::metrics;
use reqwest::Method;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One logical fetch: where to go and how hard to try.
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub job_name: &'a str,
    pub url: &'a str,
    pub method: Method,
    pub params: QueryParams,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl<'a> FetchRequest<'a> {
    /// Build the fetch for a job, with `extra` params layered over the static ones.
    pub fn for_job(job: &'a JobDescriptor, extra: Option<&QueryParams>) -> Self {
        Self {
            job_name: &job.name,
            url: &job.url,
            method: job.method.clone(),
            params: merge_query_params(&job.query_params, extra),
            timeout: job.timeout,
            max_attempts: job.max_attempts,
            backoff: job.backoff,
        }
    }
}

/// Merge `extra` over `base`. Keys present in both take the `extra` value.
pub fn merge_query_params(base: &QueryParams, extra: Option<&QueryParams>) -> QueryParams {
    let mut merged = base.clone();
    if let Some(extra) = extra {
        merged.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}

/// Performs fetches with a fixed retry count and fixed backoff.
///
/// Stateless apart from the pooled HTTP client, so a single instance is shared
/// by every scheduler loop and every on-demand trigger.
#[derive(Clone)]
pub struct RetryExecutor {
    client: reqwest::Client,
}

impl RetryExecutor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Run the fetch until it succeeds or `max_attempts` attempts have failed.
    ///
    /// A failed attempt is followed by exactly one `backoff` sleep when more
    /// attempts remain. If `cancel` fires during that sleep the remaining
    /// attempts are abandoned and the last failure is returned. An attempt that
    /// is already in flight is never interrupted.
    pub async fn fetch_with_retry(
        &self,
        request: &FetchRequest<'_>,
        cancel: Option<&CancellationToken>,
    ) -> Result<JsonValue, JobError> {
        let total = request.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(request).await {
                Ok(data) => {
                    metrics::record_fetch_attempt(request.job_name, "success");
                    debug!(
                        "Fetch for '{}' succeeded on attempt {}/{}",
                        request.job_name, attempt, total
                    );
                    return Ok(data);
                }
                Err(e) => {
                    metrics::record_fetch_attempt(request.job_name, "failure");
                    warn!(
                        "Call to API '{}' failed on attempt {}/{}: {}",
                        request.job_name, attempt, total, e
                    );

                    if attempt >= total || !backoff(request.backoff, cancel).await {
                        return Err(JobError::FetchExhausted {
                            attempts: attempt,
                            last: e,
                        });
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, request: &FetchRequest<'_>) -> Result<JsonValue, AttemptError> {
        let response = self
            .client
            .request(request.method.clone(), request.url)
            .query(&request.params)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(AttemptError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }

        response.json().await.map_err(AttemptError::Decode)
    }
}

/// Sleep for `delay`. Returns false if cancellation arrived first.
async fn backoff(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        Some(token) => {
            tokio::select! {
                _ = tokio::time::sleep(delay) => true,
                _ = token.cancelled() => {
                    info!("Backoff interrupted by cancellation");
                    false
                }
            }
        }
        None => {
            tokio::time::sleep(delay).await;
            true
        }
    }
}
