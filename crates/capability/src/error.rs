//! Error type shared by every capability adapter.
//!
//! The only distinction the pipeline cares about is transient versus
//! permanent: transient failures are retried with backoff, permanent
//! ones fail the job immediately.

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// Worth retrying: timeouts, connection failures, upstream
    /// rate limits, 5xx responses.
    #[error("Transient upstream failure: {0}")]
    Transient(String),

    /// Not worth retrying: invalid input, upstream rejection,
    /// malformed responses.
    #[error("Permanent upstream failure: {0}")]
    Permanent(String),
}

impl CapabilityError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CapabilityError::Transient(_))
    }

    /// Classify an HTTP status code from an upstream API.
    ///
    /// 429 and all 5xx are transient (rate limit, upstream hiccup);
    /// every other non-success status is permanent.
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 429 || (500..600).contains(&status) {
            CapabilityError::Transient(format!("upstream returned {status}: {body}"))
        } else {
            CapabilityError::Permanent(format!("upstream returned {status}: {body}"))
        }
    }
}

impl From<reqwest::Error> for CapabilityError {
    fn from(err: reqwest::Error) -> Self {
        // Network-level failures are retryable; response decoding
        // failures mean the upstream sent something we cannot use.
        if err.is_timeout() || err.is_connect() || err.is_request() {
            CapabilityError::Transient(err.to_string())
        } else if let Some(status) = err.status() {
            CapabilityError::from_status(status.as_u16(), err.to_string())
        } else {
            CapabilityError::Permanent(err.to_string())
        }
    }
}
