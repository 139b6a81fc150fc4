use chrono::{DateTime, Utc};

/// Opaque job identifier. UUIDv7 so ids sort by creation time while
/// remaining unguessable; generated once at admission and never reused.
pub type JobId = uuid::Uuid;

/// UTC timestamp used throughout the workspace.
pub type Timestamp = DateTime<Utc>;

/// Generate a fresh job id.
pub fn new_job_id() -> JobId {
    uuid::Uuid::now_v7()
}
