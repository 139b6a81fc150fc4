//! Object-storage uploader.
//!
//! PUTs the finished image to an OSS-style bucket endpoint and returns
//! the public URL clients poll for.

use async_trait::async_trait;

use crate::error::CapabilityError;
use crate::ports::{FinalImage, ImageStore};

/// Uploads finished images to a single bucket under a key prefix.
pub struct OssStore {
    client: reqwest::Client,
    /// Bucket endpoint, e.g. `https://bucket.oss-cn-hangzhou.example.com`.
    endpoint: String,
    /// Key prefix within the bucket, e.g. `images`.
    prefix: String,
    access_token: String,
}

impl OssStore {
    pub fn new(endpoint: String, prefix: String, access_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            prefix: prefix.trim_matches('/').to_string(),
            access_token,
        }
    }

    fn object_url(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            format!("{}/{}", self.endpoint, key)
        } else {
            format!("{}/{}/{}", self.endpoint, self.prefix, key)
        }
    }
}

#[async_trait]
impl ImageStore for OssStore {
    async fn store(&self, image: &FinalImage, key: &str) -> Result<String, CapabilityError> {
        let url = self.object_url(key);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_TYPE, image.content_type)
            .body(image.bytes.clone())
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

        tracing::debug!(%url, bytes = image.bytes.len(), "Image uploaded");
        Ok(url)
    }
}
