//! Span exporters.
//!
//! An exporter turns one batch into one delivery to a backend. The batch
//! processor owns scheduling and the concurrency ceiling; exporters only
//! deliver (and, for [`HttpExporter`], retry within their retry policy).

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::resilience::RetryPolicy;
use crate::telemetry::error::ExportError;
use crate::telemetry::resource::Resource;
use crate::telemetry::span::Span;
use crate::telemetry::wire::{self, ExportPayload};

/// Trait for exporting span batches to a backend.
///
/// Uses `impl Future` returns, which are not object-safe. Use
/// [`SpanExporterBoxed`] where dynamic dispatch is needed.
pub trait SpanExporter: Send + Sync {
    /// Deliver one batch.
    fn export(&self, batch: Vec<Span>) -> impl Future<Output = Result<(), ExportError>> + Send;

    /// Exporter name for logs.
    fn name(&self) -> &str;
}

/// Object-safe version of [`SpanExporter`].
pub trait SpanExporterBoxed: Send + Sync {
    fn export_boxed(
        &self,
        batch: Vec<Span>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExportError>> + Send + '_>>;

    fn name(&self) -> &str;
}

impl<T: SpanExporter> SpanExporterBoxed for T {
    fn export_boxed(
        &self,
        batch: Vec<Span>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExportError>> + Send + '_>> {
        Box::pin(self.export(batch))
    }

    fn name(&self) -> &str {
        SpanExporter::name(self)
    }
}

/// Exporter that POSTs JSON batches to a collector endpoint.
pub struct HttpExporter {
    client: reqwest::Client,
    endpoint: Url,
    resource: Arc<Resource>,
    retry: RetryPolicy,
}

impl HttpExporter {
    /// Create an exporter with a per-request `timeout`.
    pub fn new(
        endpoint: Url,
        resource: Arc<Resource>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, ExportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExportError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            resource,
            retry,
        })
    }

    async fn post(&self, body: Vec<u8>) -> Result<(), ExportError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, wire::CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ExportError::Status(status.as_u16()))
        }
    }
}

impl SpanExporter for HttpExporter {
    async fn export(&self, batch: Vec<Span>) -> Result<(), ExportError> {
        let body = ExportPayload::new(&self.resource, &batch).encode()?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.post(body.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && self.retry.allows_another(attempt) => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::debug!(
                        endpoint = %self.endpoint,
                        attempt,
                        delay = ?delay,
                        error = %e,
                        "Retrying span export"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if attempt > 1 => {
                    return Err(ExportError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    })
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Exporter that keeps every batch in memory, in delivery order.
#[derive(Debug, Default)]
pub struct InMemoryExporter {
    batches: Mutex<Vec<Vec<Span>>>,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes of the delivered batches.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(Vec::len)
            .collect()
    }

    /// Every delivered span, flattened.
    pub fn spans(&self) -> Vec<Span> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn exported_count(&self) -> usize {
        self.batch_sizes().iter().sum()
    }
}

impl SpanExporter for InMemoryExporter {
    async fn export(&self, batch: Vec<Span>) -> Result<(), ExportError> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch);
        Ok(())
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}

/// Exporter that always fails, for drop-policy tests.
#[cfg(test)]
pub struct FailingExporter {
    pub attempts: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FailingExporter {
    pub fn new() -> Self {
        Self {
            attempts: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

#[cfg(test)]
impl SpanExporter for FailingExporter {
    async fn export(&self, _batch: Vec<Span>) -> Result<(), ExportError> {
        self.attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Err(ExportError::Status(503))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Exporter that sleeps before recording, for concurrency tests.
#[cfg(test)]
pub struct SlowExporter {
    pub delay: Duration,
    pub inflight: std::sync::atomic::AtomicUsize,
    pub peak_inflight: std::sync::atomic::AtomicUsize,
    pub inner: InMemoryExporter,
}

#[cfg(test)]
impl SlowExporter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inflight: std::sync::atomic::AtomicUsize::new(0),
            peak_inflight: std::sync::atomic::AtomicUsize::new(0),
            inner: InMemoryExporter::new(),
        }
    }
}

#[cfg(test)]
impl SpanExporter for SlowExporter {
    async fn export(&self, batch: Vec<Span>) -> Result<(), ExportError> {
        use std::sync::atomic::Ordering;
        let now = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_inflight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inflight.fetch_sub(1, Ordering::SeqCst);
        self.inner.export(batch).await
    }

    fn name(&self) -> &str {
        "slow"
    }
}
