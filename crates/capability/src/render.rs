//! HTTP client for the image-rendering upstream.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::error::CapabilityError;
use crate::ports::{ImageRenderer, RawImage, RenderPrompt};

/// Client for a text-to-image generation endpoint.
pub struct RenderClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

/// Response returned by the render endpoint.
#[derive(Debug, Deserialize)]
struct RenderResponse {
    /// Base64-encoded PNG payload.
    image_b64: String,
}

impl RenderClient {
    /// * `api_url` - Base URL of the render service.
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
        }
    }
}

#[async_trait]
impl ImageRenderer for RenderClient {
    async fn render(
        &self,
        prompt: &RenderPrompt,
        size: &str,
        reference: Option<&[u8]>,
    ) -> Result<RawImage, CapabilityError> {
        let mut body = json!({
            "prompt": prompt.text,
            "size": size,
            "n": 1,
        });
        if let Some(bytes) = reference {
            // Some upstreams can condition the render on the overlay
            // artwork; pass it through when present.
            body["reference_image_b64"] =
                base64::engine::general_purpose::STANDARD.encode(bytes).into();
        }

        let response = self
            .client
            .post(format!("{}/images/generations", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(CapabilityError::from_status(status.as_u16(), body));
        }

        let parsed: RenderResponse = response.json().await?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(parsed.image_b64)
            .map_err(|e| {
                CapabilityError::Permanent(format!("render response was not valid base64: {e}"))
            })?;

        tracing::debug!(size, bytes = bytes.len(), "Image rendered");
        Ok(RawImage {
            bytes,
            size: size.to_string(),
        })
    }
}
