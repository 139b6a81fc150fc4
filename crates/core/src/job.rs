//! Job entity: the mutable unit of work tracked by the registry.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::stage::Stage;
use crate::types::{new_job_id, JobId, Timestamp};

/// Lifecycle status of a job. Transitions are forward-only:
/// `Queued -> Running -> {Completed, Failed}`, with `Queued -> Failed`
/// also valid (safety rejection, queue cancellation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether the status is terminal (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether a transition from `self` to `next` is allowed by the
    /// forward-only transition graph.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Classification tag stored on a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Content-safety rejection at admission; terminal before any stage.
    Unsafe,
    /// A stage failed permanently or exhausted its retries.
    StagePermanent,
    /// The overall per-job wall-clock deadline elapsed.
    Timeout,
    /// The job was removed from the wait queue before promotion.
    Cancelled,
}

/// Error details recorded when a job fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub detail: String,
}

/// One tracked execution of the generation pipeline.
///
/// Created by the admission gate, mutated exclusively through the job
/// registry, read by the status/result API. Fields mirror the polling
/// contract: `stage` is meaningful only while running, `images` stays
/// empty until completion, `error` is set only on failure.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub stage: Option<Stage>,
    pub progress: u8,
    pub message: String,
    pub images: Vec<String>,
    pub error: Option<JobError>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    /// Create a freshly-admitted job in `Queued` status, progress 0.
    pub fn queued(message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_job_id(),
            status: JobStatus::Queued,
            stage: None,
            progress: 0,
            message: message.into(),
            images: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a job that is already terminally failed, e.g. when the
    /// content-safety check rejects the prompt before anything runs.
    pub fn rejected(kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let mut job = Self::queued(detail.clone());
        job.status = JobStatus::Failed;
        job.error = Some(JobError { kind, detail });
        job
    }
}
