//! Port traits and the value types that flow between pipeline stages.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pictor_core::request::ModelKind;

use crate::error::CapabilityError;

/// Outcome of the content-safety check run before admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Blocked { reason: String },
}

/// Structured reading of what the user actually asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    /// One-sentence restatement of the request.
    pub summary: String,
    /// Visual elements the image must contain.
    #[serde(default)]
    pub key_elements: Vec<String>,
    /// Style direction, when the request implies one.
    #[serde(default)]
    pub style: Option<String>,
}

/// One candidate design produced by the ideation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignProposal {
    pub title: String,
    /// The full design direction: composition, palette, mood.
    pub direction: String,
    /// Why this design answers the request; carried into the final
    /// user-facing explanation.
    pub rationale: String,
}

/// The optimized prompt handed to the renderer.
#[derive(Debug, Clone)]
pub struct RenderPrompt {
    pub text: String,
    pub rationale: String,
}

/// Raw output of the render stage.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Vec<u8>,
    pub size: String,
}

/// Composited, ready-to-store image.
#[derive(Debug, Clone)]
pub struct FinalImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

impl From<RawImage> for FinalImage {
    /// A render with nothing to composite passes through unchanged.
    fn from(raw: RawImage) -> Self {
        FinalImage {
            bytes: raw.bytes,
            content_type: "image/png",
        }
    }
}

/// Synchronous gate on the full prompt text, called before admission.
#[async_trait]
pub trait SafetyChecker: Send + Sync {
    async fn check(&self, text: &str) -> Result<Verdict, CapabilityError>;
}

/// Stage 0: read the request's intent.
///
/// The language-side ports take the request's [`ModelKind`] so adapters
/// can dispatch to the matching upstream model per call.
#[async_trait]
pub trait IntentAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        prompt: &str,
        model: ModelKind,
        creativity: f64,
    ) -> Result<Intent, CapabilityError>;
}

/// Stage 1: produce 2-3 candidate designs. The reference image, when
/// present, is supplied so designs can account for the overlay.
#[async_trait]
pub trait DesignProposer: Send + Sync {
    async fn propose(
        &self,
        intent: &Intent,
        model: ModelKind,
        reference: Option<&[u8]>,
    ) -> Result<Vec<DesignProposal>, CapabilityError>;
}

/// Stage 2: turn the selected design into a render-ready prompt.
#[async_trait]
pub trait PromptOptimizer: Send + Sync {
    async fn optimize(
        &self,
        proposal: &DesignProposal,
        model: ModelKind,
    ) -> Result<RenderPrompt, CapabilityError>;
}

/// Stage 3: render the image.
#[async_trait]
pub trait ImageRenderer: Send + Sync {
    async fn render(
        &self,
        prompt: &RenderPrompt,
        size: &str,
        reference: Option<&[u8]>,
    ) -> Result<RawImage, CapabilityError>;
}

/// Stage 4a: composite the overlay onto the rendered image.
#[async_trait]
pub trait ImageComposer: Send + Sync {
    async fn compose(&self, base: &RawImage, overlay: &[u8]) -> Result<FinalImage, CapabilityError>;
}

/// Stage 4b: upload the final image, returning its public URL.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store(&self, image: &FinalImage, key: &str) -> Result<String, CapabilityError>;
}
