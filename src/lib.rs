//! Findata Server Library
//!
//! Polls configured financial data APIs in the background and exposes job
//! status and manual triggers over HTTP.

pub mod background_jobs;
pub mod config;
pub mod server;

// Re-export commonly used types for convenience
pub use background_jobs::{
    create_scheduler, JobContext, JobDescriptor, JobError, JobRegistry, JobScheduler,
    QueryParams, SchedulerHandle, TransformRegistry,
};
pub use config::{AppConfig, CliConfig, FileConfig};
pub use server::{run_server, RequestsLoggingLevel, ServerConfig};
