//! Pictor core domain library.
//!
//! Pure types and logic shared by every other crate: job and request
//! models, the pipeline stage table, the error taxonomy, request
//! validation, and the retry backoff policy. This crate has no I/O and
//! no internal dependencies.

pub mod error;
pub mod job;
pub mod request;
pub mod retry;
pub mod stage;
pub mod types;
