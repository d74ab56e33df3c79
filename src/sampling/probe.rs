//! Process and heap measurements.
//!
//! # Responsibilities
//! - Query CPU percentage and resident memory of the current process
//! - Query live heap bytes
//!
//! # Design Decisions
//! - Both queries may fail; callers treat a failure as "no sample this tick"
//! - Blocking calls (sysinfo reads /proc); run them off the async executor

use std::sync::{Mutex, PoisonError};

use sysinfo::{Pid, System};
use thiserror::Error;

use crate::sampling::heap;

/// Errors from a metrics query.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The current process id could not be determined.
    #[error("Cannot determine current pid: {0}")]
    Pid(String),

    /// The OS did not report the process.
    #[error("Process {0} not found")]
    ProcessNotFound(u32),

    /// No heap accounting is available in this build.
    #[error("Heap statistics unavailable: tracking allocator not installed")]
    HeapUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessStats {
    /// CPU usage since the previous query; may exceed 100 on multi-core hosts.
    pub cpu_percent: f64,
    pub resident_memory_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub used_heap_bytes: u64,
}

/// Source of host measurements consumed by the sampler.
pub trait MetricsProbe: Send + Sync {
    fn process(&self) -> Result<ProcessStats, ProbeError>;
    fn heap(&self) -> Result<HeapStats, ProbeError>;
}

/// Default probe: `sysinfo` for the process, the tracking allocator for the heap.
pub struct SystemProbe {
    pid: Pid,
    system: Mutex<System>,
}

impl SystemProbe {
    pub fn new() -> Result<Self, ProbeError> {
        let pid = sysinfo::get_current_pid().map_err(|e| ProbeError::Pid(e.to_string()))?;
        let mut system = System::new();
        // Prime the CPU counters so the first real sample has a baseline
        system.refresh_process(pid);

        Ok(Self {
            pid,
            system: Mutex::new(system),
        })
    }
}

impl MetricsProbe for SystemProbe {
    fn process(&self) -> Result<ProcessStats, ProbeError> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        if !system.refresh_process(self.pid) {
            return Err(ProbeError::ProcessNotFound(self.pid.as_u32()));
        }
        let process = system
            .process(self.pid)
            .ok_or(ProbeError::ProcessNotFound(self.pid.as_u32()))?;

        Ok(ProcessStats {
            cpu_percent: process.cpu_usage() as f64,
            resident_memory_bytes: process.memory(),
        })
    }

    fn heap(&self) -> Result<HeapStats, ProbeError> {
        heap::heap_used_bytes()
            .map(|used_heap_bytes| HeapStats { used_heap_bytes })
            .ok_or(ProbeError::HeapUnavailable)
    }
}
