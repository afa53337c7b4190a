use anyhow::{Context, Result};
use clap::Parser;
use findata_server::background_jobs::{create_scheduler, JobContext, JobRegistry, TransformRegistry};
use findata_server::config::{AppConfig, CliConfig, FileConfig};
use findata_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the TOML config file listing the APIs to poll.
    #[clap(short, long, default_value = "config/config.toml")]
    pub config: PathBuf,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 8000)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// Address to bind both servers to.
    #[clap(long, default_value = "127.0.0.1")]
    pub bind: String,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            port: self.port,
            metrics_port: self.metrics_port,
            bind_address: self.bind.clone(),
            logging_level: self.logging_level.clone(),
        }
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    info!("Loading config from {:?}...", cli_args.config);
    let file_config = FileConfig::load(&cli_args.config)?;
    let app_config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)
        .context("Invalid configuration")?;
    info!("Loaded {} API job(s)", app_config.jobs.len());

    metrics::init_metrics();

    let client = reqwest::Client::builder()
        .user_agent(concat!("findata-server/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let shutdown_token = CancellationToken::new();
    let jobs = Arc::new(JobRegistry::new(app_config.jobs));
    let context = JobContext::new(client.clone(), TransformRegistry::with_builtin());
    let (mut scheduler, scheduler_handle) =
        create_scheduler(jobs, context, shutdown_token.child_token());

    let started = scheduler.start();
    info!("Started {} polling loop(s)", started);

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Shutting down...");
        signal_token.cancel();
    });

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level,
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        bind_address: app_config.bind_address,
    };

    let server_result = run_server(server_config, scheduler_handle, shutdown_token.clone()).await;
    if let Err(e) = &server_result {
        error!("Server error: {:#}", e);
        shutdown_token.cancel();
    }

    scheduler.stop().await;
    drop(client);
    info!("Shutdown complete");

    server_result
}
