//! Startup orchestration.
//!
//! # Order
//! ```text
//! metrics endpoint → trace provider (installed globally) → sampler task
//!     → bind listener → serve
//! ```
//! Shutdown runs in reverse: stop accepting and drain requests, stop the
//! sampler, then flush and drain the span pipeline.
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)
//! - Pipeline shutdown problems are logged, not fatal

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::observability::metrics;
use crate::sampling::{ProbeError, Sampler, SystemProbe};
use crate::store::Store;
use crate::telemetry::provider::{self, TraceProvider};
use crate::telemetry::{ErrorReporter, TelemetryError};

pub const METRIC_TRACER: &str = "metricTracer";
pub const ERROR_TRACER: &str = "errorTracer";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("Failed to start metrics endpoint: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("Failed to initialize process probe: {0}")]
    Probe(#[from] ProbeError),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Run the service until SIGINT or SIGTERM.
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    run_until(config, None, signals::wait_for_signal()).await
}

/// Run the service until `signal` resolves.
///
/// Serves on `listener` when given, otherwise binds `listener.bind_address`
/// once the telemetry pipeline and the sampler are up.
pub async fn run_until(
    config: AppConfig,
    listener: Option<TcpListener>,
    signal: impl Future<Output = ()>,
) -> Result<(), StartupError> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        collector_url = %config.telemetry.collector_url,
        sample_interval_ms = config.telemetry.sample_interval_ms,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let provider = provider::install(TraceProvider::from_config(&config.telemetry)?)?;
    let shutdown = Shutdown::new();

    let sampler = Sampler::new(
        provider.tracer(METRIC_TRACER),
        Arc::new(SystemProbe::new()?),
        Duration::from_millis(config.telemetry.sample_interval_ms),
    );
    let sampler_task = tokio::spawn(sampler.run(shutdown.subscribe()));

    let listener = match listener {
        Some(listener) => listener,
        None => bind(&config.listener.bind_address).await?,
    };

    let server = HttpServer::new(
        &config,
        Arc::new(Store::seeded()),
        ErrorReporter::new(provider.tracer(ERROR_TRACER)),
    );
    let serve = server.run(listener, shutdown.subscribe());
    tokio::pin!(serve);

    let served = tokio::select! {
        result = &mut serve => result,
        _ = signal => {
            shutdown.trigger();
            (&mut serve).await
        }
    };

    // The server may have stopped on its own; make sure the sampler follows.
    shutdown.trigger();
    if let Err(e) = sampler_task.await {
        tracing::error!(error = %e, "Sampler task failed");
    }

    match provider.shutdown().await {
        Ok(()) => {
            let metrics = provider.metrics();
            tracing::info!(
                spans_exported = metrics.spans_exported(),
                spans_dropped = metrics.spans_dropped(),
                "Trace provider shut down"
            );
        }
        Err(e) => tracing::warn!(error = %e, "Trace provider shutdown incomplete"),
    }

    served.map_err(StartupError::Serve)
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}
