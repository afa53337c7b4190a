//! Job-specific payload transforms.

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// A pure conversion from fetched data to the payload that gets forwarded.
pub type TransformFn = dyn Fn(JsonValue) -> Result<JsonValue, TransformError> + Send + Sync;

/// Read-only mapping from job name to transform, built once at startup.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: HashMap<String, Arc<TransformFn>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry containing every built-in transform.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        super::jobs::register_builtin(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, job_name: impl Into<String>, transform: F)
    where
        F: Fn(JsonValue) -> Result<JsonValue, TransformError> + Send + Sync + 'static,
    {
        self.transforms.insert(job_name.into(), Arc::new(transform));
    }

    pub fn get(&self, job_name: &str) -> Option<Arc<TransformFn>> {
        self.transforms.get(job_name).cloned()
    }
}
