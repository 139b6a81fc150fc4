//! Capability ports and adapters.
//!
//! The pipeline depends on seven external operations -- content safety,
//! intent analysis, design ideation, prompt optimization, rendering,
//! composition, and storage. Each is a trait here; the adapters wrap the
//! concrete upstreams (LLM HTTP API, image render API, object storage)
//! or run locally (safety filter, composer). The runner only ever sees
//! the traits, so tests substitute in-memory stubs freely.

pub mod compose;
pub mod design;
pub mod error;
pub mod ports;
pub mod render;
pub mod safety;
pub mod store;
pub mod stub;

use std::sync::Arc;

pub use error::CapabilityError;
pub use ports::{
    DesignProposal, DesignProposer, FinalImage, ImageComposer, ImageRenderer, ImageStore, Intent,
    IntentAnalyzer, PromptOptimizer, RawImage, RenderPrompt, SafetyChecker, Verdict,
};

/// The full set of ports the pipeline needs, behind trait objects.
///
/// Cheap to clone; the binary wires real adapters in, tests wire stubs.
#[derive(Clone)]
pub struct Capabilities {
    pub safety: Arc<dyn SafetyChecker>,
    pub analyzer: Arc<dyn IntentAnalyzer>,
    pub proposer: Arc<dyn DesignProposer>,
    pub optimizer: Arc<dyn PromptOptimizer>,
    pub renderer: Arc<dyn ImageRenderer>,
    pub composer: Arc<dyn ImageComposer>,
    pub store: Arc<dyn ImageStore>,
}
