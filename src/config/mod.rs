mod file_config;

pub use file_config::{ApiConfig, FileConfig};

use crate::background_jobs::{JobDescriptor, QueryParams};
use crate::server::RequestsLoggingLevel;
use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use reqwest::Method;
use std::collections::HashSet;
use std::time::Duration;

const DEFAULT_METHOD: &str = "GET";
const DEFAULT_INTERVAL_SECS: u64 = 60;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_SECS: u64 = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const ALLOWED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
];

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub bind_address: String,
    pub logging_level: RequestsLoggingLevel,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            metrics_port: 9091,
            bind_address: "127.0.0.1".to_string(),
            logging_level: RequestsLoggingLevel::Path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub bind_address: String,
    pub logging_level: RequestsLoggingLevel,
    pub jobs: Vec<JobDescriptor>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and the TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file: FileConfig) -> Result<Self> {
        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        let bind_address = file
            .bind_address
            .unwrap_or_else(|| cli.bind_address.clone());

        let logging_level = match file.logging_level {
            Some(s) => parse_logging_level(&s)
                .ok_or_else(|| anyhow!("Invalid logging_level in config file: '{}'", s))?,
            None => cli.logging_level.clone(),
        };

        let apis = file
            .apis
            .ok_or_else(|| anyhow!("Config file must contain a top-level 'apis' list."))?;
        if apis.is_empty() {
            bail!("No APIs configured in config file.");
        }

        let mut seen = HashSet::new();
        let mut jobs = Vec::with_capacity(apis.len());
        for (index, api) in apis.iter().enumerate() {
            let job = resolve_job(api).with_context(|| format!("Invalid entry apis[{}]", index))?;
            if !seen.insert(job.name.clone()) {
                bail!("Duplicate API name '{}' in config file", job.name);
            }
            jobs.push(job);
        }

        Ok(Self {
            port,
            metrics_port,
            bind_address,
            logging_level,
            jobs,
        })
    }
}

fn resolve_job(api: &ApiConfig) -> Result<JobDescriptor> {
    let name = api
        .name
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("Each API config must have a 'name' field."))?;

    let url = api
        .url
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("API '{}' must have a 'url' field.", name))?;

    let method_str = api
        .method
        .as_deref()
        .unwrap_or(DEFAULT_METHOD)
        .to_uppercase();
    let method = ALLOWED_METHODS
        .iter()
        .find(|m| m.as_str() == method_str)
        .cloned()
        .ok_or_else(|| anyhow!("API '{}' has invalid method '{}'", name, method_str))?;

    let interval_seconds = api.interval_seconds.unwrap_or(DEFAULT_INTERVAL_SECS);
    if interval_seconds == 0 {
        bail!("API '{}' must have 'interval_seconds' greater than 0", name);
    }

    let max_retries = api.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
    if max_retries == 0 {
        bail!("API '{}' must have 'max_retries' of at least 1", name);
    }

    let timeout_seconds = api.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        bail!("API '{}' must have 'timeout_seconds' greater than 0", name);
    }

    let query_params = match &api.query_params {
        Some(table) => stringify_params(name, table)?,
        None => QueryParams::new(),
    };

    Ok(JobDescriptor {
        name: name.to_string(),
        url: url.to_string(),
        method,
        query_params,
        target_url: api.target_url.clone().filter(|s| !s.is_empty()),
        interval: Duration::from_secs(interval_seconds),
        max_attempts: max_retries,
        backoff: Duration::from_secs(api.retry_backoff_seconds.unwrap_or(DEFAULT_BACKOFF_SECS)),
        timeout: Duration::from_secs(timeout_seconds),
        enabled: api.enabled.unwrap_or(true),
    })
}

fn stringify_params(name: &str, table: &toml::Table) -> Result<QueryParams> {
    table
        .iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(i) => i.to_string(),
                // Debug keeps the fractional part, so 1.0 stays "1.0".
                toml::Value::Float(f) => format!("{:?}", f),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Datetime(dt) => dt.to_string(),
                toml::Value::Array(_) | toml::Value::Table(_) => bail!(
                    "API '{}' has invalid 'query_params' value for '{}' (must be a scalar)",
                    name,
                    key
                ),
            };
            Ok((key.clone(), value))
        })
        .collect()
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
