//! Deterministic in-memory adapters.
//!
//! Used by tests and by local development without upstream credentials:
//! every port is implemented with canned, deterministic output so the
//! whole pipeline runs offline. The designer derives its output from the
//! prompt text, the renderer emits a tiny valid PNG, and the store
//! "uploads" to a fake URL while remembering what it was given.

use std::sync::Mutex;

use async_trait::async_trait;

use pictor_core::request::ModelKind;

use crate::error::CapabilityError;
use crate::ports::{
    DesignProposal, DesignProposer, FinalImage, ImageComposer, ImageRenderer, ImageStore, Intent,
    IntentAnalyzer, PromptOptimizer, RawImage, RenderPrompt, SafetyChecker, Verdict,
};

/// Allows everything.
pub struct AllowAllSafety;

#[async_trait]
impl SafetyChecker for AllowAllSafety {
    async fn check(&self, _text: &str) -> Result<Verdict, CapabilityError> {
        Ok(Verdict::Allowed)
    }
}

/// Derives intent, proposals, and the render prompt from the raw prompt
/// text with no upstream call.
pub struct StubDesigner;

#[async_trait]
impl IntentAnalyzer for StubDesigner {
    async fn analyze(
        &self,
        prompt: &str,
        _model: ModelKind,
        _creativity: f64,
    ) -> Result<Intent, CapabilityError> {
        Ok(Intent {
            summary: format!("An image of: {prompt}"),
            key_elements: vec![prompt.to_string()],
            style: None,
        })
    }
}

#[async_trait]
impl DesignProposer for StubDesigner {
    async fn propose(
        &self,
        intent: &Intent,
        _model: ModelKind,
        _reference: Option<&[u8]>,
    ) -> Result<Vec<DesignProposal>, CapabilityError> {
        // Top-ranked proposal first; the runner always takes the head.
        Ok(vec![
            DesignProposal {
                title: "Primary concept".into(),
                direction: format!("Centered composition. {}", intent.summary),
                rationale: "Directly depicts the requested subject".into(),
            },
            DesignProposal {
                title: "Alternate concept".into(),
                direction: format!("Off-center composition. {}", intent.summary),
                rationale: "A looser interpretation".into(),
            },
        ])
    }
}

#[async_trait]
impl PromptOptimizer for StubDesigner {
    async fn optimize(
        &self,
        proposal: &DesignProposal,
        _model: ModelKind,
    ) -> Result<RenderPrompt, CapabilityError> {
        Ok(RenderPrompt {
            text: format!("{}, high detail, soft lighting", proposal.direction),
            rationale: proposal.rationale.clone(),
        })
    }
}

/// A 1x1 transparent PNG, the smallest payload decoders accept.
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x62, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Always renders [`TINY_PNG`].
pub struct StubRenderer;

#[async_trait]
impl ImageRenderer for StubRenderer {
    async fn render(
        &self,
        _prompt: &RenderPrompt,
        size: &str,
        _reference: Option<&[u8]>,
    ) -> Result<RawImage, CapabilityError> {
        Ok(RawImage {
            bytes: TINY_PNG.to_vec(),
            size: size.to_string(),
        })
    }
}

/// Passes the base image through untouched.
pub struct PassthroughComposer;

#[async_trait]
impl ImageComposer for PassthroughComposer {
    async fn compose(
        &self,
        base: &RawImage,
        _overlay: &[u8],
    ) -> Result<FinalImage, CapabilityError> {
        Ok(FinalImage {
            bytes: base.bytes.clone(),
            content_type: "image/png",
        })
    }
}

/// Records stored keys and returns fake URLs.
#[derive(Default)]
pub struct MemoryStore {
    stored: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys stored so far, in order.
    pub fn keys(&self) -> Vec<String> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn store(&self, _image: &FinalImage, key: &str) -> Result<String, CapabilityError> {
        self.stored.lock().unwrap().push(key.to_string());
        Ok(format!("https://images.test/{key}"))
    }
}

/// A full capability set wired with the in-memory adapters above plus
/// the real [`TermFilter`](crate::safety::TermFilter), so content-safety
/// behaviour matches production.
pub fn stub_capabilities() -> crate::Capabilities {
    use std::sync::Arc;
    crate::Capabilities {
        safety: Arc::new(crate::safety::TermFilter::new()),
        analyzer: Arc::new(StubDesigner),
        proposer: Arc::new(StubDesigner),
        optimizer: Arc::new(StubDesigner),
        renderer: Arc::new(StubRenderer),
        composer: Arc::new(PassthroughComposer),
        store: Arc::new(MemoryStore::new()),
    }
}
