//! Span pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! sampler tick / failed request
//!     → tracer.rs (open span, close exactly once)
//!     → processor.rs (buffer, flush by size or hold time)
//!     → exporter.rs + wire.rs (JSON POST, bounded concurrency, bounded retry)
//!     → remote collector
//!
//! provider.rs owns the wiring: resource.rs identity + processor + exporter.
//! ```
//!
//! # Design Decisions
//! - Closing a span is a lock-protected append; network I/O is never on the
//!   caller's path
//! - One provider per process; the handle is passed explicitly to the
//!   sampler and the error reporter
//! - Undeliverable batches are retried a bounded number of times, then dropped
//!   with a warning

pub mod error;
pub mod exporter;
pub mod processor;
pub mod provider;
pub mod reporter;
pub mod resource;
pub mod span;
pub mod tracer;
pub mod wire;

pub use error::{ExportError, TelemetryError};
pub use exporter::{HttpExporter, InMemoryExporter, SpanExporter, SpanExporterBoxed};
pub use processor::{BatchConfig, BatchSpanProcessor, ExportMetrics};
pub use provider::TraceProvider;
pub use reporter::{ErrorReporter, Failure, RouteLabel};
pub use resource::Resource;
pub use span::{AttributeValue, Span, SpanStatus};
pub use tracer::{ActiveSpan, Tracer};
