//! Telemetry-instrumented record service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ handlers ──▶ store
//!                          │
//!                          │ 500 + Failure
//!                          ▼
//!                    error reporter ──┐
//!                                     ├──▶ tracer ──▶ batch processor ──▶ HTTP exporter ──▶ collector
//!     sampler (fixed delay) ──────────┘
//!         │
//!         └── process probe (sysinfo + tracking allocator)
//! ```

use std::path::PathBuf;

use clap::Parser;

use telemetry_app::config::{load_config, validate_config, AppConfig};
use telemetry_app::lifecycle::startup;
use telemetry_app::observability::logging;
use telemetry_app::sampling::TrackingAllocator;

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator::new();

#[derive(Parser, Debug)]
#[command(name = "telemetry-app", version, about = "Record service with span export")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(long)]
    bind: Option<String>,

    /// Override telemetry.collector_url
    #[arg(long)]
    collector_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(url) = cli.collector_url {
        config.telemetry.collector_url = url;
    }
    validate_config(&config).map_err(telemetry_app::config::ConfigError::Validation)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "telemetry-app starting");

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
