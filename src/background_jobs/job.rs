use reqwest::{Method, StatusCode};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Static query parameters attached to a fetch.
pub type QueryParams = BTreeMap<String, String>;

/// Immutable configuration for one polling target.
///
/// Built once from configuration and never mutated afterwards, so it can be
/// shared freely between the scheduler loop and on-demand triggers.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    /// Unique job name, the key for every lookup.
    pub name: String,
    pub url: String,
    pub method: Method,
    pub query_params: QueryParams,
    /// When present, successful payloads are POSTed here.
    pub target_url: Option<String>,
    /// Time between the end of one scheduled run and the start of the next.
    pub interval: Duration,
    /// Total number of fetch attempts, always at least 1.
    pub max_attempts: u32,
    /// Fixed delay between failed fetch attempts.
    pub backoff: Duration,
    /// Per-request timeout, applied to fetch attempts and to the forward.
    pub timeout: Duration,
    pub enabled: bool,
}

impl JobDescriptor {
    /// Create a descriptor with the same defaults the config loader applies.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            method: Method::GET,
            query_params: QueryParams::new(),
            target_url: None,
            interval: Duration::from_secs(60),
            max_attempts: 3,
            backoff: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
            enabled: true,
        }
    }
}

/// All configured jobs, in configuration order, indexed by name.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Vec<Arc<JobDescriptor>>,
    by_name: HashMap<String, usize>,
}

impl JobRegistry {
    /// Build the registry. Names are expected to be unique already; a repeated
    /// name is dropped with a warning.
    pub fn new(jobs: impl IntoIterator<Item = JobDescriptor>) -> Self {
        let mut registry = Self::default();
        for job in jobs {
            if registry.by_name.contains_key(&job.name) {
                warn!("Ignoring duplicate job '{}'", job.name);
                continue;
            }
            registry
                .by_name
                .insert(job.name.clone(), registry.jobs.len());
            registry.jobs.push(Arc::new(job));
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&Arc<JobDescriptor>> {
        self.by_name.get(name).map(|&idx| &self.jobs[idx])
    }

    /// Enabled job by name. Disabled jobs are treated as unknown.
    pub fn get_enabled(&self, name: &str) -> Option<&Arc<JobDescriptor>> {
        self.get(name).filter(|job| job.enabled)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<JobDescriptor>> {
        self.jobs.iter()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Arc<JobDescriptor>> {
        self.jobs.iter().filter(|job| job.enabled)
    }
}

/// Why a single HTTP attempt failed.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("upstream responded with status {0}")]
    Status(StatusCode),

    #[error("invalid response body: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Errors that can occur while running a job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("fetch failed after {attempts} attempt(s): {last}")]
    FetchExhausted {
        attempts: u32,
        #[source]
        last: AttemptError,
    },

    #[error("Job '{0}' not found")]
    JobNotFound(String),

    #[error("Error sending to target: {0}")]
    ForwardFailed(#[source] AttemptError),

    #[error("transform failed: {0}")]
    TransformFailed(String),
}

impl JobError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::FetchExhausted { .. } => "fetch_exhausted",
            JobError::JobNotFound(_) => "not_found",
            JobError::ForwardFailed(_) => "forward_failed",
            JobError::TransformFailed(_) => "transform_failed",
        }
    }
}
