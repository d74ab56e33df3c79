//! Telemetry error definitions.

use thiserror::Error;

/// Errors raised while wiring or tearing down the trace pipeline.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Collector endpoint missing or malformed.
    #[error("Invalid collector URL '{url}': {reason}")]
    InvalidCollectorUrl { url: String, reason: String },

    /// A process-wide provider is already registered.
    #[error("A trace provider is already installed for this process")]
    AlreadyInstalled,

    /// The HTTP client for the exporter could not be built.
    #[error("Exporter setup failed: {0}")]
    Exporter(#[from] ExportError),

    /// In-flight exports did not finish before the shutdown deadline.
    #[error("Shutdown timed out after {0} ms with exports still in flight")]
    ShutdownTimeout(u64),

    /// The processor worker is gone (panicked or already stopped).
    #[error("Span processor worker is not running")]
    WorkerGone,
}

/// Errors from a single export attempt or an exhausted retry sequence.
#[derive(Debug, Error, Clone)]
pub enum ExportError {
    /// Network-level failure (connect, reset, DNS).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request did not complete within the export timeout.
    #[error("Export timed out")]
    Timeout,

    /// The collector answered with a non-2xx status.
    #[error("Collector rejected batch with status {0}")]
    Status(u16),

    /// The payload could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Every allowed attempt failed.
    #[error("All {attempts} export attempts failed, last error: {last}")]
    RetriesExhausted { attempts: u32, last: Box<ExportError> },
}

impl ExportError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExportError::Transport(_) | ExportError::Timeout => true,
            ExportError::Status(status) => crate::resilience::retries::is_retryable_status(*status),
            ExportError::Serialization(_) | ExportError::RetriesExhausted { .. } => false,
        }
    }
}

impl From<reqwest::Error> for ExportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ExportError::Timeout
        } else if let Some(status) = e.status() {
            ExportError::Status(status.as_u16())
        } else {
            ExportError::Transport(e.to_string())
        }
    }
}
