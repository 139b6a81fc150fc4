//! Immutable generation request and its validation rules.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Lower bound of the creativity parameter.
pub const MIN_CREATIVITY: f64 = 0.1;
/// Upper bound of the creativity parameter.
pub const MAX_CREATIVITY: f64 = 1.0;
/// Maximum accepted prompt length, in characters.
pub const MAX_PROMPT_CHARS: usize = 4000;
/// Render size used when the request carries no aspect-ratio hint.
pub const DEFAULT_SIZE: &str = "1024x1024";

/// Capability selector for the design-side language model.
///
/// Model-specific dispatch is a strategy-table lookup keyed by this
/// variant, not inheritance; adapters resolve it to a concrete upstream
/// model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Pro,
    Flash,
}

impl std::str::FromStr for ModelKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pro" => Ok(ModelKind::Pro),
            "flash" => Ok(ModelKind::Flash),
            other => Err(CoreError::Validation(format!(
                "Unknown model selector '{other}' (expected 'pro' or 'flash')"
            ))),
        }
    }
}

/// Caller input, copied into a job on admission and never mutated.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Raw natural-language prompt.
    pub prompt: String,
    /// Optional overlay image (logo, QR code) composited onto the render.
    pub reference_image: Option<Vec<u8>>,
    /// Which design model to dispatch to.
    pub model: ModelKind,
    /// Sampling temperature passed to the design model, 0.1..=1.0.
    pub creativity: f64,
    /// Optional `WxH` render size hint.
    pub aspect_ratio: Option<String>,
    /// When the caller submitted the request.
    pub submitted_at: Timestamp,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            reference_image: None,
            model: ModelKind::default(),
            creativity: 0.7,
            aspect_ratio: None,
            submitted_at: Utc::now(),
        }
    }

    /// Render size to use: the aspect-ratio hint, or the default.
    pub fn render_size(&self) -> &str {
        self.aspect_ratio.as_deref().unwrap_or(DEFAULT_SIZE)
    }
}

/// Validate a request before admission.
///
/// Rules:
/// - Prompt must not be empty (after trimming) and must not exceed
///   [`MAX_PROMPT_CHARS`] characters.
/// - Creativity must lie within [`MIN_CREATIVITY`]..=[`MAX_CREATIVITY`].
/// - An aspect-ratio hint, when present, must have the shape `WxH` with
///   positive integer dimensions.
pub fn validate_request(request: &GenerationRequest) -> Result<(), CoreError> {
    if request.prompt.trim().is_empty() {
        return Err(CoreError::Validation(
            "Prompt must not be empty".to_string(),
        ));
    }
    let chars = request.prompt.chars().count();
    if chars > MAX_PROMPT_CHARS {
        return Err(CoreError::Validation(format!(
            "Prompt must not exceed {MAX_PROMPT_CHARS} characters (got {chars})"
        )));
    }
    if !(MIN_CREATIVITY..=MAX_CREATIVITY).contains(&request.creativity) {
        return Err(CoreError::Validation(format!(
            "Creativity must be between {MIN_CREATIVITY} and {MAX_CREATIVITY}"
        )));
    }
    if let Some(ref ratio) = request.aspect_ratio {
        validate_size(ratio)?;
    }
    Ok(())
}

/// Validate a `WxH` size string such as `1024x1024`.
fn validate_size(size: &str) -> Result<(), CoreError> {
    let parts: Vec<&str> = size.split('x').collect();
    let valid = parts.len() == 2
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()) && *p != "0");
    if !valid {
        return Err(CoreError::Validation(format!(
            "Aspect ratio must look like '1024x1024', got '{size}'"
        )));
    }
    Ok(())
}
