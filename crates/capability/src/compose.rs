//! Local image composition.
//!
//! Overlays the caller's reference image (logo, QR code) onto the
//! rendered base at a corner position. The decode/encode work is CPU
//! bound, so it runs on the blocking pool.

use async_trait::async_trait;
use image::imageops::FilterType;
use image::ImageFormat;

use crate::error::CapabilityError;
use crate::ports::{FinalImage, ImageComposer, RawImage};

/// Where the overlay lands on the base image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

/// Composites an overlay at a fixed position and relative scale.
pub struct LocalComposer {
    position: OverlayPosition,
    /// Overlay width as a fraction of the base width, `0.0..=1.0`.
    scale: f32,
    /// Margin from the edges, in pixels.
    margin: u32,
}

impl LocalComposer {
    pub fn new(position: OverlayPosition, scale: f32) -> Self {
        Self {
            position,
            scale: scale.clamp(0.05, 1.0),
            margin: 16,
        }
    }
}

impl Default for LocalComposer {
    /// Bottom-right at 20% of the base width, the conventional spot for
    /// a logo or QR code.
    fn default() -> Self {
        Self::new(OverlayPosition::BottomRight, 0.2)
    }
}

fn compose_blocking(
    base_bytes: &[u8],
    overlay_bytes: &[u8],
    position: OverlayPosition,
    scale: f32,
    margin: u32,
) -> Result<Vec<u8>, CapabilityError> {
    let mut base = image::load_from_memory(base_bytes)
        .map_err(|e| CapabilityError::Permanent(format!("cannot decode base image: {e}")))?;
    let overlay = image::load_from_memory(overlay_bytes)
        .map_err(|e| CapabilityError::Permanent(format!("cannot decode overlay image: {e}")))?;

    let target_w = ((base.width() as f32 * scale) as u32).max(1);
    let ratio = overlay.height() as f32 / overlay.width() as f32;
    let target_h = ((target_w as f32 * ratio) as u32).max(1);
    let overlay = overlay.resize(target_w, target_h, FilterType::Lanczos3);

    let max_x = base.width().saturating_sub(overlay.width());
    let max_y = base.height().saturating_sub(overlay.height());
    let (x, y) = match position {
        OverlayPosition::TopLeft => (margin.min(max_x), margin.min(max_y)),
        OverlayPosition::TopRight => (max_x.saturating_sub(margin), margin.min(max_y)),
        OverlayPosition::BottomLeft => (margin.min(max_x), max_y.saturating_sub(margin)),
        OverlayPosition::BottomRight => {
            (max_x.saturating_sub(margin), max_y.saturating_sub(margin))
        }
        OverlayPosition::Center => (max_x / 2, max_y / 2),
    };

    image::imageops::overlay(&mut base, &overlay, x as i64, y as i64);

    let mut out = Vec::new();
    base.write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| CapabilityError::Permanent(format!("cannot encode composed image: {e}")))?;
    Ok(out)
}

#[async_trait]
impl ImageComposer for LocalComposer {
    async fn compose(
        &self,
        base: &RawImage,
        overlay: &[u8],
    ) -> Result<FinalImage, CapabilityError> {
        let base_bytes = base.bytes.clone();
        let overlay_bytes = overlay.to_vec();
        let (position, scale, margin) = (self.position, self.scale, self.margin);

        let bytes = tokio::task::spawn_blocking(move || {
            compose_blocking(&base_bytes, &overlay_bytes, position, scale, margin)
        })
        .await
        .map_err(|e| CapabilityError::Permanent(format!("composition task panicked: {e}")))??;

        Ok(FinalImage {
            bytes,
            content_type: "image/png",
        })
    }
}
