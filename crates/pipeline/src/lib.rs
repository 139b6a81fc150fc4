//! Request lifecycle orchestration.
//!
//! [`AdmissionGate`] decides whether an incoming request runs now, waits
//! in FIFO order, or is rejected; [`PipelineRunner`] drives one admitted
//! job through the five ordered stages. The two share a single global
//! execution slot: at most one job is ever `running`.

pub mod gate;
pub mod runner;

use std::time::Duration;

use pictor_core::retry::RetryConfig;

pub use gate::{AdmissionGate, GateError, SubmitTicket};
pub use runner::PipelineRunner;

/// Tunables for admission and stage execution.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Maximum number of jobs allowed to wait behind the execution slot.
    /// Arrivals beyond this are rejected as busy rather than queued.
    pub queue_capacity: usize,
    /// Backoff policy for transient capability failures.
    pub retry: RetryConfig,
    /// Wall-clock ceiling for one job, measured from `running` start.
    pub job_timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 50,
            retry: RetryConfig::default(),
            job_timeout: Duration::from_secs(300),
        }
    }
}
