use std::sync::Arc;

use pictor_pipeline::gate::AdmissionGate;
use pictor_registry::JobRegistry;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Admission gate: validation, safety check, single-flight slot, queue.
    pub gate: Arc<AdmissionGate>,
    /// In-process job registry, shared with the gate and pipeline runner.
    pub registry: JobRegistry,
    /// Server configuration (accessed by middleware and handlers).
    pub config: Arc<ServerConfig>,
}
