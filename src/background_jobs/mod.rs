//! Background polling of configured data sources.
//!
//! Each enabled job gets its own loop that fetches with retries, optionally
//! transforms the payload and forwards it, then sleeps for the job interval.
//! The same pipeline can be triggered on demand through [`SchedulerHandle`].

mod context;
mod fetcher;
mod forwarder;
mod handle;
mod job;
pub mod jobs;
mod scheduler;
mod status;
mod transform;

#[cfg(test)]
pub(crate) mod test_upstream;

pub use context::{JobContext, Trigger};
pub use fetcher::{merge_query_params, FetchRequest, RetryExecutor};
pub use forwarder::Forwarder;
pub use handle::{JobInfo, JobRunReport, SchedulerHandle};
pub use job::{AttemptError, JobDescriptor, JobError, JobRegistry, QueryParams};
pub use scheduler::{create_scheduler, JobLifecycle, JobScheduler};
pub use status::{JobStatus, JobStatusTracker};
pub use transform::{TransformError, TransformFn, TransformRegistry};
