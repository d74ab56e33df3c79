//! Periodic resource sampling.
//!
//! Fixed-delay schedule: the next wait starts only after the previous tick's
//! span has closed, so a slow tick delays the next one instead of overlapping.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::observability::metrics;
use crate::sampling::probe::{MetricsProbe, ProbeError};
use crate::telemetry::tracer::Tracer;

pub const METRIC_SPAN: &str = "metric";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One tick's measurements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRecord {
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub heap_used_bytes: u64,
}

impl SampleRecord {
    /// Query both the process and the heap. Either failure fails the sample.
    pub fn collect(probe: &dyn MetricsProbe) -> Result<Self, ProbeError> {
        let process = probe.process()?;
        let heap = probe.heap()?;
        Ok(Self {
            cpu_percent: process.cpu_percent,
            memory_bytes: process.resident_memory_bytes,
            heap_used_bytes: heap.used_heap_bytes,
        })
    }

    pub fn cpu_attribute(&self) -> String {
        format!("{:.2}%", self.cpu_percent)
    }

    pub fn memory_attribute(&self) -> String {
        format!("{:.2} MB", self.memory_bytes as f64 / BYTES_PER_MB)
    }

    pub fn heap_attribute(&self) -> String {
        format!("{:.2} MB", self.heap_used_bytes as f64 / BYTES_PER_MB)
    }
}

/// Records a `"metric"` span every `interval`.
pub struct Sampler {
    tracer: Tracer,
    probe: Arc<dyn MetricsProbe>,
    interval: Duration,
}

impl Sampler {
    pub fn new(tracer: Tracer, probe: Arc<dyn MetricsProbe>, interval: Duration) -> Self {
        Self {
            tracer,
            probe,
            interval,
        }
    }

    /// Run until the shutdown signal fires (or its sender is dropped).
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Sampler starting");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Sampler received shutdown signal, exiting loop");
                    break;
                }
            }

            self.tick().await;
        }
    }

    /// Take one sample. Returns whether a span was recorded.
    pub async fn tick(&self) -> bool {
        let probe = Arc::clone(&self.probe);
        let sample = tokio::task::spawn_blocking(move || SampleRecord::collect(probe.as_ref())).await;

        match sample {
            Ok(Ok(record)) => {
                self.record(&record);
                true
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Skipping sample tick");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Sample task failed, skipping tick");
                false
            }
        }
    }

    fn record(&self, record: &SampleRecord) {
        self.tracer.in_span(METRIC_SPAN, |span| {
            span.set_attribute("cpu", record.cpu_attribute());
            span.set_attribute("memoryUsage", record.memory_attribute());
            span.set_attribute("heapUsage", record.heap_attribute());
        });
        metrics::record_process_sample(record.cpu_percent, record.memory_bytes, record.heap_used_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::probe::{HeapStats, ProcessStats};
    use crate::telemetry::exporter::InMemoryExporter;
    use crate::telemetry::processor::BatchConfig;
    use crate::telemetry::provider::TraceProvider;
    use crate::telemetry::resource::Resource;
    use crate::telemetry::span::AttributeValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProbe {
        delay: Duration,
        fail_every: Option<usize>,
        calls: AtomicUsize,
    }

    impl FixedProbe {
        fn new(delay: Duration, fail_every: Option<usize>) -> Self {
            Self {
                delay,
                fail_every,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl MetricsProbe for FixedProbe {
        fn process(&self) -> Result<ProcessStats, ProbeError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            std::thread::sleep(self.delay);
            if matches!(self.fail_every, Some(n) if call % n == 0) {
                return Err(ProbeError::ProcessNotFound(1));
            }
            Ok(ProcessStats {
                cpu_percent: 12.345,
                resident_memory_bytes: 50 * 1024 * 1024,
            })
        }

        fn heap(&self) -> Result<HeapStats, ProbeError> {
            Ok(HeapStats {
                used_heap_bytes: 3 * 1024 * 1024 + 512 * 1024,
            })
        }
    }

    fn provider() -> (TraceProvider, Arc<InMemoryExporter>) {
        let exporter = Arc::new(InMemoryExporter::new());
        let provider = TraceProvider::with_exporter(
            Resource::default(),
            BatchConfig::default(),
            exporter.clone(),
        );
        (provider, exporter)
    }

    #[test]
    fn test_attribute_formatting() {
        let record = SampleRecord {
            cpu_percent: 3.14159,
            memory_bytes: 50 * 1024 * 1024,
            heap_used_bytes: 1024 * 1024 + 512 * 1024,
        };
        assert_eq!(record.cpu_attribute(), "3.14%");
        assert_eq!(record.memory_attribute(), "50.00 MB");
        assert_eq!(record.heap_attribute(), "1.50 MB");
    }

    #[tokio::test]
    async fn test_tick_records_metric_span() {
        let (provider, exporter) = provider();
        let sampler = Sampler::new(
            provider.tracer("metricTracer"),
            Arc::new(FixedProbe::new(Duration::ZERO, None)),
            Duration::from_secs(10),
        );

        assert!(sampler.tick().await);
        provider.shutdown().await.unwrap();

        let spans = exporter.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "metric");
        assert_eq!(spans[0].attributes.len(), 3);
        assert_eq!(spans[0].attributes.get("cpu"), Some(&AttributeValue::from("12.35%")));
        assert_eq!(spans[0].attributes.get("memoryUsage"), Some(&AttributeValue::from("50.00 MB")));
        assert_eq!(spans[0].attributes.get("heapUsage"), Some(&AttributeValue::from("3.50 MB")));
    }

    #[tokio::test]
    async fn test_failed_probe_skips_tick() {
        let (provider, exporter) = provider();
        let sampler = Sampler::new(
            provider.tracer("metricTracer"),
            Arc::new(FixedProbe::new(Duration::ZERO, Some(1))),
            Duration::from_secs(10),
        );

        assert!(!sampler.tick().await);
        provider.shutdown().await.unwrap();
        assert_eq!(exporter.exported_count(), 0);
    }

    #[tokio::test]
    async fn test_loop_rearms_after_failure_and_ticks_never_overlap() {
        let (provider, exporter) = provider();
        let interval = Duration::from_millis(30);
        let sampler = Sampler::new(
            provider.tracer("metricTracer"),
            // every third sample fails; each sample takes 20ms
            Arc::new(FixedProbe::new(Duration::from_millis(20), Some(3))),
            interval,
        );

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(sampler.run(rx));
        tokio::time::sleep(Duration::from_millis(400)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();
        provider.shutdown().await.unwrap();

        let spans = exporter.spans();
        assert!(spans.len() >= 3, "expected several ticks, got {}", spans.len());

        for pair in spans.windows(2) {
            let prev_end = pair[0].end_time.unwrap();
            let next_start = pair[1].start_time;
            assert!(next_start >= prev_end + interval);
        }
    }

    #[tokio::test]
    async fn test_dropped_shutdown_sender_stops_loop() {
        let (provider, _exporter) = provider();
        let sampler = Sampler::new(
            provider.tracer("metricTracer"),
            Arc::new(FixedProbe::new(Duration::ZERO, None)),
            Duration::from_secs(3600),
        );

        let (tx, rx) = broadcast::channel::<()>(1);
        let handle = tokio::spawn(sampler.run(rx));
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sampler should stop")
            .unwrap();
        provider.shutdown().await.unwrap();
    }
}
