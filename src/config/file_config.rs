use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub bind_address: Option<String>,
    pub logging_level: Option<String>,

    // Polled APIs
    pub apis: Option<Vec<ApiConfig>>,
}

/// One `[[apis]]` entry. Every field is optional here so that missing
/// required fields can be reported by name during resolution.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub name: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub interval_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_backoff_seconds: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub target_url: Option<String>,
    pub enabled: Option<bool>,
    pub query_params: Option<toml::Table>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
