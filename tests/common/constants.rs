//! Shared constants for end-to-end tests

/// Maximum time to wait for the server to answer its health check
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// How often to poll while waiting for the server
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

/// Maximum time to wait for a job status to change
pub const STATUS_WAIT_TIMEOUT_MS: u64 = 5000;

/// Upstream path that serves a fund comparison listing
pub const FUNDS_PATH: &str = "/funds";

/// Upstream path that always answers 500
pub const BROKEN_PATH: &str = "/broken";

/// Upstream path that accepts forwarded payloads
pub const SINK_PATH: &str = "/sink";

/// Upstream path that rejects forwarded payloads
pub const REJECTING_SINK_PATH: &str = "/sink-rejecting";
