//! Resource sampling subsystem.
//!
//! # Data Flow
//! ```text
//! sampler.rs (fixed-delay loop)
//!     → probe.rs (sysinfo process stats + heap.rs allocator counter)
//!     → one "metric" span per successful tick
//! ```

pub mod heap;
pub mod probe;
pub mod sampler;

pub use heap::TrackingAllocator;
pub use probe::{MetricsProbe, ProbeError, SystemProbe};
pub use sampler::{SampleRecord, Sampler};
