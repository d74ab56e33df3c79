//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Export attempt to collector:
//!     → On failure: retries.rs (retryable? attempts left?)
//!     → backoff.rs (jittered exponential delay)
//!     → next attempt, or drop the batch with a warning
//! ```
//!
//! # Design Decisions
//! - Every export has a deadline (reqwest client timeout)
//! - Retries are bounded; an unreachable collector costs spans, not memory

pub mod backoff;
pub mod retries;

pub use retries::RetryPolicy;
