use super::context::{JobContext, Trigger};
use super::handle::SchedulerHandle;
use super::job::{JobDescriptor, JobRegistry};
use crate::server::metrics;
use chrono::Utc;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Lifecycle of one job's scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobLifecycle {
    NotStarted,
    Running,
    Stopping,
    Stopped,
}

struct RunningJob {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Owns one polling loop per enabled job.
pub struct JobScheduler {
    jobs: Arc<JobRegistry>,

    /// Shared context provided to every loop.
    context: JobContext,

    /// Loops currently alive, keyed by job name.
    running: HashMap<String, RunningJob>,

    lifecycle: HashMap<String, JobLifecycle>,

    /// Parent of every per-loop cancellation token.
    shutdown_token: CancellationToken,
}

impl JobScheduler {
    pub fn new(
        jobs: Arc<JobRegistry>,
        context: JobContext,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            jobs,
            context,
            running: HashMap::new(),
            lifecycle: HashMap::new(),
            shutdown_token,
        }
    }

    /// Launch a loop for every enabled job that is not running yet.
    ///
    /// Returns the number of loops started by this call. Disabled jobs get
    /// neither a loop nor a status entry.
    pub fn start(&mut self) -> usize {
        let mut started = 0;

        for job in self.jobs.iter() {
            if !job.enabled {
                info!("API '{}' is disabled in config; skipping", job.name);
                continue;
            }
            if self.running.contains_key(&job.name) {
                debug!("Job '{}' is already running; skipping", job.name);
                continue;
            }

            self.context.status.ensure_entry(&job.name);

            let cancel_token = self.shutdown_token.child_token();
            let handle = tokio::spawn(run_loop(
                Arc::clone(job),
                self.context.clone(),
                cancel_token.clone(),
            ));

            self.running.insert(
                job.name.clone(),
                RunningJob {
                    handle,
                    cancel_token,
                },
            );
            self.lifecycle
                .insert(job.name.clone(), JobLifecycle::Running);
            started += 1;

            info!(
                "Started job for API '{}' with interval {:?}",
                job.name, job.interval
            );
        }

        metrics::set_jobs_running(self.running.len());
        started
    }

    /// Cancel every loop and wait until each one has terminated.
    ///
    /// Loops only notice cancellation while sleeping, so a run that is in
    /// flight finishes and records its outcome before its loop exits.
    pub async fn stop(&mut self) {
        info!("Stopping {} job loop(s)...", self.running.len());

        for (name, running) in &self.running {
            debug!("Cancelling job: {}", name);
            self.lifecycle.insert(name.clone(), JobLifecycle::Stopping);
            running.cancel_token.cancel();
        }

        for (name, running) in self.running.drain() {
            match running.handle.await {
                Ok(()) => info!("Job '{}' cancelled", name),
                Err(e) => error!("Job '{}' loop terminated abnormally: {}", name, e),
            }
            self.lifecycle.insert(name, JobLifecycle::Stopped);
        }

        metrics::set_jobs_running(0);
        info!("Scheduler shutdown complete");
    }

    pub fn lifecycle(&self, job_name: &str) -> JobLifecycle {
        self.lifecycle
            .get(job_name)
            .copied()
            .unwrap_or(JobLifecycle::NotStarted)
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn is_running(&self, job_name: &str) -> bool {
        self.running.contains_key(job_name)
    }
}

/// Body of a job's loop: run, record, sleep, repeat until cancelled.
async fn run_loop(job: Arc<JobDescriptor>, ctx: JobContext, cancel_token: CancellationToken) {
    loop {
        if cancel_token.is_cancelled() {
            break;
        }

        run_scheduled(&job, &ctx, &cancel_token).await;

        tokio::select! {
            _ = tokio::time::sleep(job.interval) => {}
            _ = cancel_token.cancelled() => break,
        }
    }
    debug!("Loop for job '{}' exited", job.name);
}

async fn run_scheduled(job: &JobDescriptor, ctx: &JobContext, cancel_token: &CancellationToken) {
    let start_time = Instant::now();
    ctx.status.record_run_started(&job.name, Utc::now());
    debug!("Running job '{}'", job.name);

    let result = AssertUnwindSafe(ctx.execute_run(job, None, Trigger::Schedule, Some(cancel_token)))
        .catch_unwind()
        .await;
    let elapsed = start_time.elapsed();

    let status_label = match result {
        Ok(Ok(_)) => {
            ctx.status.record_success(&job.name, Utc::now());
            info!("Job '{}' completed successfully in {:?}", job.name, elapsed);
            "success"
        }
        Ok(Err(e)) => {
            ctx.status.record_failure(&job.name, e.to_string());
            error!("Job '{}' failed after {:?}: {}", job.name, elapsed, e);
            e.kind()
        }
        Err(_) => {
            ctx.status.record_failure(&job.name, "Task panic");
            error!("Job '{}' panicked after {:?}", job.name, elapsed);
            "panic"
        }
    };

    metrics::record_job_run(&job.name, Trigger::Schedule.as_str(), status_label, elapsed);
}

/// Create a scheduler and its handle.
pub fn create_scheduler(
    jobs: Arc<JobRegistry>,
    context: JobContext,
    shutdown_token: CancellationToken,
) -> (JobScheduler, SchedulerHandle) {
    let handle = SchedulerHandle::new(Arc::clone(&jobs), context.clone());
    let scheduler = JobScheduler::new(jobs, context, shutdown_token);
    (scheduler, handle)
}
