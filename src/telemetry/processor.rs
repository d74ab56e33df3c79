//! Batch span processor.
//!
//! # Data Flow
//! ```text
//! ActiveSpan closes
//!     → on_end(): append under the buffer lock
//!         → buffer full? swap it out, queue Export(batch)
//! worker task
//!     → hold timer expired? swap buffer out, queue Export(batch)
//!     → Export(batch): wait for a semaphore permit, spawn export task
//!     → Flush / Shutdown: wait for in-flight exports, acknowledge
//! ```
//!
//! # Backpressure
//! Spans held in the buffer plus spans queued but not yet dispatched never
//! exceed `max_queue_size`. Beyond that `on_end` drops the span.
//!
//! # Shutdown
//! `shutdown` publishes one deadline, `now + shutdown_timeout`, covering
//! both the batches still waiting for a permit and the exports in flight.
//! Batches not dispatched by then are dropped; exports still running are
//! aborted.
//!
//! # Ordering
//! Every batch is queued while the buffer lock is held, so the worker sees
//! batches in emission order and a span can never land in two batches.
//!
//! # Concurrency
//! - `on_end` never awaits and never touches the network
//! - At most `max_concurrent_exports` export tasks run at once; further
//!   batches wait in the command queue

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch, Notify, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;

use crate::config::TelemetryConfig;
use crate::observability::metrics;
use crate::telemetry::error::TelemetryError;
use crate::telemetry::exporter::SpanExporterBoxed;
use crate::telemetry::span::Span;

/// Configuration for batching and export scheduling.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Flush as soon as this many spans are buffered.
    pub max_batch_size: usize,
    /// Flush once the oldest buffered span has waited this long.
    pub max_hold: Duration,
    /// Ceiling on concurrently running exports.
    pub max_concurrent_exports: usize,
    /// Upper bound on buffered plus queued spans.
    pub max_queue_size: usize,
    /// How long shutdown waits for queued and in-flight exports.
    pub shutdown_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 512,
            max_hold: Duration::from_secs(5),
            max_concurrent_exports: 10,
            max_queue_size: 2048,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&TelemetryConfig> for BatchConfig {
    fn from(config: &TelemetryConfig) -> Self {
        Self {
            max_batch_size: config.batch_max_size,
            max_hold: Duration::from_millis(config.batch_max_hold_ms),
            max_concurrent_exports: config.export_concurrency_limit,
            max_queue_size: config.max_queue_size,
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
        }
    }
}

/// Thread-safe export counters.
#[derive(Debug, Default)]
pub struct ExportMetrics {
    spans_exported: AtomicU64,
    batches_exported: AtomicU64,
    export_errors: AtomicU64,
    spans_dropped: AtomicU64,
    inflight_exports: AtomicU64,
}

impl ExportMetrics {
    pub fn spans_exported(&self) -> u64 {
        self.spans_exported.load(Ordering::Relaxed)
    }

    pub fn batches_exported(&self) -> u64 {
        self.batches_exported.load(Ordering::Relaxed)
    }

    pub fn export_errors(&self) -> u64 {
        self.export_errors.load(Ordering::Relaxed)
    }

    pub fn spans_dropped(&self) -> u64 {
        self.spans_dropped.load(Ordering::Relaxed)
    }

    pub fn inflight_exports(&self) -> u64 {
        self.inflight_exports.load(Ordering::Relaxed)
    }

    fn record_success(&self, span_count: u64) {
        self.spans_exported.fetch_add(span_count, Ordering::Relaxed);
        self.batches_exported.fetch_add(1, Ordering::Relaxed);
        metrics::record_spans_exported(span_count);
    }

    fn record_error(&self, span_count: u64) {
        self.export_errors.fetch_add(1, Ordering::Relaxed);
        self.record_dropped(span_count, "export_failed");
    }

    fn record_dropped(&self, span_count: u64, reason: &'static str) {
        self.spans_dropped.fetch_add(span_count, Ordering::Relaxed);
        metrics::record_spans_dropped(span_count, reason);
    }

    fn inc_inflight(&self) {
        let now = self.inflight_exports.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::set_export_inflight(now);
    }

    fn dec_inflight(&self) {
        let now = self.inflight_exports.fetch_sub(1, Ordering::Relaxed) - 1;
        metrics::set_export_inflight(now);
    }
}

enum Command {
    Export(Vec<Span>),
    /// Acknowledged once every dispatched export has finished.
    Flush(oneshot::Sender<bool>),
    /// Like `Flush`, bounded by the shutdown deadline; stops the worker.
    Shutdown(Instant, oneshot::Sender<bool>),
}

#[derive(Default)]
struct Buffer {
    spans: Vec<Span>,
    oldest: Option<Instant>,
}

struct Shared {
    buffer: Mutex<Buffer>,
    commands: mpsc::UnboundedSender<Command>,
    wake: Notify,
    closed: AtomicBool,
    /// Spans sent to the worker and not yet dispatched or dropped.
    queued: AtomicUsize,
    /// Set once, when shutdown starts.
    stop: watch::Sender<Option<Instant>>,
    config: BatchConfig,
    metrics: Arc<ExportMetrics>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap the buffer out and queue it. Must be called with the lock held.
    fn queue_locked(&self, buffer: &mut Buffer) {
        if buffer.spans.is_empty() {
            return;
        }
        buffer.oldest = None;
        let batch = std::mem::take(&mut buffer.spans);
        self.queued.fetch_add(batch.len(), Ordering::AcqRel);
        if let Err(mpsc::error::SendError(command)) = self.commands.send(Command::Export(batch)) {
            if let Command::Export(lost) = command {
                self.queued.fetch_sub(lost.len(), Ordering::AcqRel);
                tracing::warn!(spans = lost.len(), "Span processor worker gone, dropping batch");
                self.metrics.record_dropped(lost.len() as u64, "worker_gone");
            }
        }
    }

    /// Start the shutdown clock. Must be called with the lock held, before
    /// the final batch and the `Shutdown` command are queued.
    fn start_stop_clock(&self) -> Instant {
        let deadline = Instant::now() + self.config.shutdown_timeout;
        self.stop.send_replace(Some(deadline));
        deadline
    }

    fn deadline(&self) -> Option<Instant> {
        self.lock().oldest.map(|oldest| oldest + self.config.max_hold)
    }

    fn flush_expired(&self) {
        let mut buffer = self.lock();
        if let Some(oldest) = buffer.oldest {
            if oldest + self.config.max_hold <= Instant::now() {
                self.queue_locked(&mut buffer);
            }
        }
    }
}

/// Buffers closed spans and hands them to the exporter in batches.
///
/// Must be created inside a Tokio runtime; it spawns its worker task.
pub struct BatchSpanProcessor {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BatchSpanProcessor {
    pub fn new(config: BatchConfig, exporter: Arc<dyn SpanExporterBoxed>) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (stop, stop_rx) = watch::channel(None);
        let permits = Arc::new(Semaphore::new(config.max_concurrent_exports.max(1)));
        let shared = Arc::new(Shared {
            buffer: Mutex::new(Buffer::default()),
            commands,
            wake: Notify::new(),
            closed: AtomicBool::new(false),
            queued: AtomicUsize::new(0),
            stop,
            config,
            metrics: Arc::new(ExportMetrics::default()),
        });

        tracing::debug!(
            exporter = exporter.name(),
            max_batch_size = shared.config.max_batch_size,
            max_hold = ?shared.config.max_hold,
            max_concurrent_exports = shared.config.max_concurrent_exports,
            max_queue_size = shared.config.max_queue_size,
            "Span processor starting"
        );

        let worker = Worker {
            shared: Arc::clone(&shared),
            exporter,
            receiver,
            stop: stop_rx,
            permits,
            tasks: JoinSet::new(),
        };
        let handle = tokio::spawn(worker.run());

        Self {
            shared,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Accept a span. Ends it if the caller has not already done so.
    ///
    /// Spans arriving after shutdown, or while `max_queue_size` spans are
    /// already waiting, are dropped and counted.
    pub fn on_end(&self, mut span: Span) {
        span.end();

        let mut buffer = self.shared.lock();
        if self.shared.closed.load(Ordering::Acquire) {
            drop(buffer);
            tracing::warn!(span = %span.name, "Span processor shut down, dropping span");
            self.shared.metrics.record_dropped(1, "shutdown");
            return;
        }

        let held = self.shared.queued.load(Ordering::Acquire) + buffer.spans.len();
        if held >= self.shared.config.max_queue_size {
            drop(buffer);
            tracing::debug!(span = %span.name, held, "Span queue full, dropping span");
            self.shared.metrics.record_dropped(1, "queue_full");
            return;
        }

        if buffer.spans.is_empty() {
            buffer.oldest = Some(Instant::now());
        }
        buffer.spans.push(span);

        if buffer.spans.len() >= self.shared.config.max_batch_size {
            self.shared.queue_locked(&mut buffer);
        } else if buffer.spans.len() == 1 {
            // New hold deadline for the worker
            self.shared.wake.notify_one();
        }
    }

    /// Export everything buffered and wait for all in-flight exports.
    pub async fn force_flush(&self) -> Result<(), TelemetryError> {
        let ack = {
            let mut buffer = self.shared.lock();
            if self.shared.closed.load(Ordering::Acquire) {
                return Ok(());
            }
            self.shared.queue_locked(&mut buffer);
            let (tx, rx) = oneshot::channel();
            self.shared
                .commands
                .send(Command::Flush(tx))
                .map_err(|_| TelemetryError::WorkerGone)?;
            rx
        };

        ack.await.map_err(|_| TelemetryError::WorkerGone)?;
        Ok(())
    }

    /// Flush remaining spans, wait for exports (bounded), stop the worker.
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) -> Result<(), TelemetryError> {
        let ack = {
            let mut buffer = self.shared.lock();
            if self.shared.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            let deadline = self.shared.start_stop_clock();
            self.shared.queue_locked(&mut buffer);
            let (tx, rx) = oneshot::channel();
            self.shared
                .commands
                .send(Command::Shutdown(deadline, tx))
                .map_err(|_| TelemetryError::WorkerGone)?;
            rx
        };

        let drained = ack.await.map_err(|_| TelemetryError::WorkerGone)?;

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Span processor worker failed");
            }
        }

        if drained {
            Ok(())
        } else {
            Err(TelemetryError::ShutdownTimeout(
                self.shared.config.shutdown_timeout.as_millis() as u64,
            ))
        }
    }

    /// Number of spans waiting in the buffer.
    pub fn pending(&self) -> usize {
        self.shared.lock().spans.len()
    }

    pub fn metrics(&self) -> &Arc<ExportMetrics> {
        &self.shared.metrics
    }
}

impl Drop for BatchSpanProcessor {
    fn drop(&mut self) {
        // Let the worker drain and exit when the last handle goes away
        let mut buffer = self.shared.lock();
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            let deadline = self.shared.start_stop_clock();
            self.shared.queue_locked(&mut buffer);
            let (tx, _rx) = oneshot::channel();
            let _ = self.shared.commands.send(Command::Shutdown(deadline, tx));
        }
    }
}

struct Worker {
    shared: Arc<Shared>,
    exporter: Arc<dyn SpanExporterBoxed>,
    receiver: mpsc::UnboundedReceiver<Command>,
    stop: watch::Receiver<Option<Instant>>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            let deadline = self.shared.deadline();

            tokio::select! {
                biased;

                command = self.receiver.recv() => match command {
                    Some(Command::Export(batch)) => self.dispatch(batch).await,
                    Some(Command::Flush(ack)) => {
                        let drained = self.drain(None).await;
                        let _ = ack.send(drained);
                    }
                    Some(Command::Shutdown(deadline, ack)) => {
                        let drained = self.drain(Some(deadline)).await;
                        let _ = ack.send(drained);
                        break;
                    }
                    None => break,
                },

                Some(result) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Span export task panicked");
                    }
                }

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.shared.flush_expired();
                }

                _ = self.shared.wake.notified() => {}
            }
        }

        tracing::debug!("Span processor stopped");
    }

    async fn dispatch(&mut self, batch: Vec<Span>) {
        let span_count = batch.len();
        let mut stop = self.stop.clone();
        let permit = tokio::select! {
            biased;

            _ = stop_deadline(&mut stop) => None,
            permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
        };
        self.shared.queued.fetch_sub(span_count, Ordering::AcqRel);

        let Some(permit) = permit else {
            tracing::warn!(spans = span_count, "Shutdown deadline passed, dropping queued batch");
            self.shared.metrics.record_dropped(span_count as u64, "shutdown");
            return;
        };

        let exporter = Arc::clone(&self.exporter);
        let guard = InflightGuard::new(Arc::clone(&self.shared.metrics), batch.len() as u64);

        self.tasks.spawn(async move {
            export_batch(exporter, batch, guard).await;
            drop(permit);
        });
    }

    /// Wait for every spawned export. Returns false if `deadline` passed first.
    async fn drain(&mut self, deadline: Option<Instant>) -> bool {
        let tasks = &mut self.tasks;
        let join_all = async move {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Span export task panicked");
                }
            }
        };

        match deadline {
            None => {
                join_all.await;
                true
            }
            Some(deadline) => match tokio::time::timeout_at(deadline, join_all).await {
                Ok(()) => true,
                Err(_) => {
                    tracing::warn!(
                        inflight = self.shared.metrics.inflight_exports(),
                        timeout = ?self.shared.config.shutdown_timeout,
                        "Exports still running at shutdown deadline, aborting"
                    );
                    self.tasks.shutdown().await;
                    false
                }
            },
        }
    }
}

/// Resolves once the shutdown deadline has passed. Never resolves before
/// shutdown starts.
async fn stop_deadline(stop: &mut watch::Receiver<Option<Instant>>) {
    let deadline = match stop.wait_for(Option::is_some).await {
        Ok(deadline) => *deadline,
        Err(_) => None,
    };
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Tracks one in-flight export. Spans of an export that never settles
/// (aborted at shutdown) are counted as dropped.
struct InflightGuard {
    metrics: Arc<ExportMetrics>,
    spans: u64,
    settled: bool,
}

impl InflightGuard {
    fn new(metrics: Arc<ExportMetrics>, spans: u64) -> Self {
        metrics.inc_inflight();
        Self {
            metrics,
            spans,
            settled: false,
        }
    }

    fn succeeded(mut self) {
        self.metrics.record_success(self.spans);
        self.settled = true;
    }

    fn failed(mut self) {
        self.metrics.record_error(self.spans);
        self.settled = true;
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.metrics.dec_inflight();
        if !self.settled {
            self.metrics.record_dropped(self.spans, "aborted");
        }
    }
}

async fn export_batch(exporter: Arc<dyn SpanExporterBoxed>, batch: Vec<Span>, guard: InflightGuard) {
    let span_count = batch.len();
    let started = std::time::Instant::now();
    let result = exporter.export_boxed(batch).await;
    metrics::record_export_duration(exporter.name(), started);

    match result {
        Ok(()) => {
            tracing::trace!(exporter = exporter.name(), spans = span_count, "Span batch exported");
            guard.succeeded();
        }
        Err(e) => {
            tracing::warn!(
                exporter = exporter.name(),
                spans = span_count,
                error = %e,
                "Dropping undeliverable span batch"
            );
            guard.failed();
        }
    }
}
