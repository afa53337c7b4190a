use super::context::{JobContext, Trigger};
use super::job::{JobDescriptor, JobError, JobRegistry, QueryParams};
use super::status::JobStatus;
use crate::server::metrics;
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Information about a started job for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub name: String,
    pub url: String,
    pub interval_seconds: u64,
    pub enabled: bool,
    pub last_run: Option<String>,
    pub last_success: Option<String>,
    pub last_error: Option<String>,
    pub run_count: u64,
}

impl JobInfo {
    fn new(job: &JobDescriptor, status: JobStatus) -> Self {
        JobInfo {
            name: job.name.clone(),
            url: job.url.clone(),
            interval_seconds: job.interval.as_secs(),
            enabled: job.enabled,
            last_run: status.last_run.map(|dt| dt.to_rfc3339()),
            last_success: status.last_success.map(|dt| dt.to_rfc3339()),
            last_error: status.last_error,
            run_count: status.run_count,
        }
    }
}

/// Per-job outcome of a run-all request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobRunReport {
    pub name: String,
    pub ok: bool,
    pub error: Option<String>,
}

/// Handle to query job status and trigger runs from HTTP handlers.
///
/// Shares the scheduler's context, so manual runs reuse the same HTTP client
/// and write the same status records as the scheduled loops.
#[derive(Clone)]
pub struct SchedulerHandle {
    jobs: Arc<JobRegistry>,
    context: JobContext,
}

impl SchedulerHandle {
    pub fn new(jobs: Arc<JobRegistry>, context: JobContext) -> Self {
        Self { jobs, context }
    }

    /// Snapshot of a job's status, `None` if the job was never started.
    pub fn status(&self, job_name: &str) -> Option<JobStatus> {
        self.context.status.snapshot(job_name)
    }

    /// Every started job, in configuration order.
    pub fn list_jobs(&self) -> Vec<JobInfo> {
        self.jobs
            .iter()
            .filter_map(|job| {
                self.context
                    .status
                    .snapshot(&job.name)
                    .map(|status| JobInfo::new(job, status))
            })
            .collect()
    }

    pub fn get_job(&self, job_name: &str) -> Option<JobInfo> {
        let job = self.jobs.get(job_name)?;
        let status = self.context.status.snapshot(job_name)?;
        Some(JobInfo::new(job, status))
    }

    /// Run a job once, outside its schedule.
    ///
    /// `extra_params` are layered over the job's static query parameters.
    /// Only a fully successful run is recorded in the job's status; failures
    /// are returned to the caller and leave the status as it was.
    pub async fn run_once(
        &self,
        job_name: &str,
        extra_params: &QueryParams,
    ) -> Result<(), JobError> {
        let job = self
            .jobs
            .get_enabled(job_name)
            .cloned()
            .ok_or_else(|| JobError::JobNotFound(job_name.to_string()))?;

        let started_at = Utc::now();
        let start_time = Instant::now();
        let result = self
            .context
            .execute_run(&job, Some(extra_params), Trigger::Manual, None)
            .await;
        let elapsed = start_time.elapsed();

        match result {
            Ok(_) => {
                self.context
                    .status
                    .record_manual_success(&job.name, started_at, Utc::now());
                info!("Manual run of '{}' completed in {:?}", job.name, elapsed);
                metrics::record_job_run(&job.name, Trigger::Manual.as_str(), "success", elapsed);
                Ok(())
            }
            Err(e) => {
                warn!("Manual run of '{}' failed after {:?}: {}", job.name, elapsed, e);
                metrics::record_job_run(&job.name, Trigger::Manual.as_str(), e.kind(), elapsed);
                Err(e)
            }
        }
    }

    /// Fetch every enabled job once and report each outcome.
    ///
    /// Jobs are fetched concurrently and independently. Nothing is transformed,
    /// forwarded or recorded in job status.
    pub async fn run_all_once(&self) -> Vec<JobRunReport> {
        let runs = self.jobs.enabled().map(|job| async move {
            match self.context.fetch(job, None, None).await {
                Ok(_) => JobRunReport {
                    name: job.name.clone(),
                    ok: true,
                    error: None,
                },
                Err(e) => JobRunReport {
                    name: job.name.clone(),
                    ok: false,
                    error: Some(e.to_string()),
                },
            }
        });

        let reports = join_all(runs).await;
        let failed = reports.iter().filter(|r| !r.ok).count();
        info!(
            "Run-all finished: {} job(s), {} failed",
            reports.len(),
            failed
        );
        reports
    }
}
