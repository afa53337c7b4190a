//! Common test infrastructure
//!
//! Tests import from this module only. A [`TestUpstream`] plays the polled
//! data source and the forward target, and a [`TestServer`] runs the whole
//! application (scheduler plus HTTP API) against it.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestUpstream};
//!
//! #[tokio::test]
//! async fn test_health() {
//!     let upstream = TestUpstream::spawn().await;
//!     let server = TestServer::spawn(&upstream.single_job_config("/funds")).await;
//!     let response = reqwest::get(format!("{}/health", server.base_url)).await.unwrap();
//!     assert!(response.status().is_success());
//! }
//! ```

mod constants;
mod server;
mod upstream;

pub use constants::*;
pub use server::TestServer;
pub use upstream::TestUpstream;
