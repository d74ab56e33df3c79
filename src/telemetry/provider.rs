//! Trace provider: wiring and lifecycle.
//!
//! # Lifecycle
//! ```text
//! from_config()  → validate collector URL, build resource + exporter + processor
//! install()      → register as the process-wide provider (once)
//! tracer(name)   → cheap handles, all routed to the same processor
//! shutdown()     → final flush, bounded wait for exports, reject new spans
//! ```

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use url::Url;

use crate::config::TelemetryConfig;
use crate::resilience::RetryPolicy;
use crate::telemetry::error::TelemetryError;
use crate::telemetry::exporter::{HttpExporter, SpanExporterBoxed};
use crate::telemetry::processor::{BatchConfig, BatchSpanProcessor, ExportMetrics};
use crate::telemetry::resource::Resource;
use crate::telemetry::tracer::Tracer;

static GLOBAL_PROVIDER: OnceLock<TraceProvider> = OnceLock::new();

/// Owner of the span pipeline. Clones share the same pipeline.
#[derive(Clone)]
pub struct TraceProvider {
    resource: Arc<Resource>,
    processor: Arc<BatchSpanProcessor>,
}

impl TraceProvider {
    /// Build the HTTP export pipeline described by `config`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let endpoint = parse_collector_url(&config.collector_url)?;
        let resource = Arc::new(Resource::for_service(
            &config.service_name,
            &config.service_version,
        ));

        let exporter = HttpExporter::new(
            endpoint,
            Arc::clone(&resource),
            Duration::from_millis(config.export_timeout_ms),
            RetryPolicy::from(&config.export_retry),
        )?;

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            collector = %config.collector_url,
            concurrency_limit = config.export_concurrency_limit,
            batch_max_size = config.batch_max_size,
            batch_max_hold_ms = config.batch_max_hold_ms,
            "Trace provider initialized"
        );

        Ok(Self::with_resource(resource, BatchConfig::from(config), Arc::new(exporter)))
    }

    /// Wire an arbitrary exporter.
    pub fn with_exporter(
        resource: Resource,
        batch: BatchConfig,
        exporter: Arc<dyn SpanExporterBoxed>,
    ) -> Self {
        Self::with_resource(Arc::new(resource), batch, exporter)
    }

    fn with_resource(
        resource: Arc<Resource>,
        batch: BatchConfig,
        exporter: Arc<dyn SpanExporterBoxed>,
    ) -> Self {
        Self {
            resource,
            processor: Arc::new(BatchSpanProcessor::new(batch, exporter)),
        }
    }

    /// A tracer whose spans carry `name` as their scope.
    pub fn tracer(&self, name: &str) -> Tracer {
        Tracer::new(name, Arc::clone(&self.processor))
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn metrics(&self) -> &Arc<ExportMetrics> {
        self.processor.metrics()
    }

    pub async fn force_flush(&self) -> Result<(), TelemetryError> {
        self.processor.force_flush().await
    }

    /// Drain buffered spans and stop exporting. Idempotent.
    pub async fn shutdown(&self) -> Result<(), TelemetryError> {
        tracing::info!(pending = self.processor.pending(), "Trace provider shutting down");
        let result = self.processor.shutdown().await;

        let metrics = self.processor.metrics();
        tracing::info!(
            spans_exported = metrics.spans_exported(),
            spans_dropped = metrics.spans_dropped(),
            "Trace provider shut down"
        );
        result
    }
}

/// Register `provider` as the process-wide default.
///
/// Only the first call succeeds; a second provider would mean two exporters
/// competing for the same collector.
pub fn install(provider: TraceProvider) -> Result<&'static TraceProvider, TelemetryError> {
    let mut installed = false;
    let global = GLOBAL_PROVIDER.get_or_init(|| {
        installed = true;
        provider
    });
    if installed {
        Ok(global)
    } else {
        Err(TelemetryError::AlreadyInstalled)
    }
}

/// The process-wide provider, if one was installed.
pub fn global() -> Option<&'static TraceProvider> {
    GLOBAL_PROVIDER.get()
}

/// A tracer from the process-wide provider.
pub fn global_tracer(name: &str) -> Option<Tracer> {
    global().map(|provider| provider.tracer(name))
}

/// Accept only non-empty absolute `http`/`https` URLs.
pub fn parse_collector_url(raw: &str) -> Result<Url, TelemetryError> {
    let invalid = |reason: String| TelemetryError::InvalidCollectorUrl {
        url: raw.to_string(),
        reason,
    };

    if raw.trim().is_empty() {
        return Err(invalid("collector URL is empty".to_string()));
    }
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}
