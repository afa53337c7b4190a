use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Outcome record of one job, updated by every run of that job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobStatus {
    /// Start of the most recent run, scheduled or manual.
    pub last_run: Option<DateTime<Utc>>,
    /// Completion of the most recent fully successful run.
    pub last_success: Option<DateTime<Utc>>,
    /// Message of the most recent failure, cleared by a success.
    pub last_error: Option<String>,
    pub run_count: u64,
}

/// Per-job status records shared between scheduler loops and triggers.
///
/// Each record sits behind its own mutex and every update below is applied
/// under a single lock acquisition, so readers never see half of an outcome.
#[derive(Clone, Default)]
pub struct JobStatusTracker {
    entries: Arc<RwLock<HashMap<String, Arc<Mutex<JobStatus>>>>>,
}

fn lock(entry: &Mutex<JobStatus>) -> MutexGuard<'_, JobStatus> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl JobStatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zeroed entry for `job_name` if none exists yet.
    pub fn ensure_entry(&self, job_name: &str) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(job_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(JobStatus::default())));
    }

    fn entry(&self, job_name: &str) -> Option<Arc<Mutex<JobStatus>>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_name)
            .cloned()
    }

    /// Copy of the current status, or `None` if the job was never started.
    pub fn snapshot(&self, job_name: &str) -> Option<JobStatus> {
        let entry = self.entry(job_name)?;
        let status = lock(&entry).clone();
        Some(status)
    }

    /// Mark the start of a scheduled run. Returns false if there is no entry.
    pub fn record_run_started(&self, job_name: &str, at: DateTime<Utc>) -> bool {
        let Some(entry) = self.entry(job_name) else {
            return false;
        };
        let mut status = lock(&entry);
        status.last_run = Some(at);
        status.run_count += 1;
        true
    }

    pub fn record_success(&self, job_name: &str, at: DateTime<Utc>) -> bool {
        let Some(entry) = self.entry(job_name) else {
            return false;
        };
        let mut status = lock(&entry);
        status.last_success = Some(at);
        status.last_error = None;
        true
    }

    /// Record a failure. `last_success` is left untouched.
    pub fn record_failure(&self, job_name: &str, error: impl Into<String>) -> bool {
        let Some(entry) = self.entry(job_name) else {
            return false;
        };
        lock(&entry).last_error = Some(error.into());
        true
    }

    /// Record a complete successful manual run in one update.
    pub fn record_manual_success(
        &self,
        job_name: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> bool {
        let Some(entry) = self.entry(job_name) else {
            return false;
        };
        let mut status = lock(&entry);
        status.last_run = Some(started_at);
        status.last_success = Some(finished_at);
        status.last_error = None;
        status.run_count += 1;
        true
    }
}
