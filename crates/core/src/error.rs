use crate::types::JobId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: JobId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Prompt rejected by content-safety check: {0}")]
    Unsafe(String),

    #[error("Generation queue is full ({queued}/{capacity}), try again later")]
    Busy { queued: usize, capacity: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}
