//! Tracer handles and the active-span guard.
//!
//! A span is owned by exactly one [`ActiveSpan`] until it closes. Closing
//! happens once: on [`ActiveSpan::end`] or when the guard is dropped, which
//! covers early returns, `?` propagation and panics unwinding through the
//! caller. A span closed by a panic is marked [`SpanStatus::Error`].

use std::sync::Arc;

use crate::telemetry::processor::BatchSpanProcessor;
use crate::telemetry::span::{AttributeValue, Span, SpanStatus};

/// Lightweight handle that opens spans routed to one processor.
#[derive(Clone)]
pub struct Tracer {
    scope: Arc<str>,
    processor: Arc<BatchSpanProcessor>,
}

impl Tracer {
    pub(crate) fn new(scope: &str, processor: Arc<BatchSpanProcessor>) -> Self {
        Self {
            scope: Arc::from(scope),
            processor,
        }
    }

    /// Open a span. It closes when the guard is ended or dropped.
    pub fn start(&self, name: impl Into<String>) -> ActiveSpan {
        ActiveSpan {
            span: Some(Span::new(self.scope.as_ref(), name)),
            processor: Arc::clone(&self.processor),
        }
    }

    /// Run `f` inside a new span and close the span however `f` exits.
    pub fn in_span<F, R>(&self, name: impl Into<String>, f: F) -> R
    where
        F: FnOnce(&mut ActiveSpan) -> R,
    {
        let mut span = self.start(name);
        f(&mut span)
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer").field("scope", &self.scope).finish()
    }
}

/// An open span. Mutations are only possible while the guard is alive.
pub struct ActiveSpan {
    span: Option<Span>,
    processor: Arc<BatchSpanProcessor>,
}

impl ActiveSpan {
    /// Set an attribute; a repeated key overwrites the previous value.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        if let Some(span) = self.span.as_mut() {
            span.attributes.set(key, value);
        }
    }

    pub fn set_status(&mut self, status: SpanStatus) {
        if let Some(span) = self.span.as_mut() {
            span.status = status;
        }
    }

    /// Close the span now and hand it to the processor.
    pub fn end(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(mut span) = self.span.take() {
            if std::thread::panicking() {
                span.status = SpanStatus::Error;
            }
            span.end();
            self.processor.on_end(span);
        }
    }
}

impl Drop for ActiveSpan {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::exporter::InMemoryExporter;
    use crate::telemetry::processor::BatchConfig;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn tracer() -> (Tracer, Arc<BatchSpanProcessor>, Arc<InMemoryExporter>) {
        let exporter = Arc::new(InMemoryExporter::new());
        let processor = Arc::new(BatchSpanProcessor::new(BatchConfig::default(), exporter.clone()));
        (Tracer::new("test", Arc::clone(&processor)), processor, exporter)
    }

    #[tokio::test]
    async fn test_span_closed_on_normal_return() {
        let (tracer, processor, exporter) = tracer();

        let value = tracer.in_span("ok", |span| {
            span.set_attribute("k", "v");
            42
        });
        assert_eq!(value, 42);

        processor.shutdown().await.unwrap();
        let spans = exporter.spans();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].end_time.is_some());
        assert_eq!(spans[0].status, SpanStatus::Ok);
        assert_eq!(spans[0].scope, "test");
    }

    #[tokio::test]
    async fn test_span_closed_on_error_return() {
        let (tracer, processor, exporter) = tracer();

        let result: Result<(), String> = tracer.in_span("fails", |span| {
            span.set_attribute("step", 1);
            Err::<(), _>("boom".to_string())?;
            span.set_attribute("step", 2);
            Ok(())
        });
        assert!(result.is_err());

        processor.shutdown().await.unwrap();
        let spans = exporter.spans();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].end_time.is_some());
        assert_eq!(spans[0].attributes.get("step"), Some(&AttributeValue::Int(1)));
    }

    #[tokio::test]
    async fn test_span_closed_on_panic() {
        let (tracer, processor, exporter) = tracer();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            tracer.in_span("panics", |_span| {
                panic!("handler blew up");
            })
        }));
        assert!(outcome.is_err());

        processor.shutdown().await.unwrap();
        let spans = exporter.spans();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].end_time.is_some());
        assert_eq!(spans[0].status, SpanStatus::Error);
    }

    #[tokio::test]
    async fn test_explicit_end_closes_once() {
        let (tracer, processor, exporter) = tracer();

        let mut span = tracer.start("manual");
        span.set_attribute("k", 1);
        span.set_attribute("k", 2);
        span.end();

        processor.shutdown().await.unwrap();
        let spans = exporter.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].attributes.len(), 1);
        assert_eq!(spans[0].attributes.get("k"), Some(&AttributeValue::Int(2)));
    }

    #[tokio::test]
    async fn test_guard_survives_await_points() {
        let (tracer, processor, exporter) = tracer();

        {
            let mut span = tracer.start("async-work");
            tokio::task::yield_now().await;
            span.set_attribute("done", true);
        }

        processor.shutdown().await.unwrap();
        assert_eq!(exporter.spans()[0].attributes.get("done"), Some(&AttributeValue::Bool(true)));
    }
}
