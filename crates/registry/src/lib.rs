//! In-process job registry.
//!
//! Concurrency-safe map from job id to [`Job`], mutated by the admission
//! gate and pipeline runner, read by the polling API. Every mutator is
//! atomic with respect to concurrent readers, status transitions are
//! forward-only, and progress never regresses -- a late write against a
//! terminal job is dropped and logged rather than surfaced, since the
//! slot-release path must not fail.
//!
//! The registry is deliberately in-process; a deployment that needs to
//! share jobs across processes can put an externally-backed store behind
//! the same surface.

pub mod retention;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use pictor_core::job::{ErrorKind, Job, JobError, JobStatus};
use pictor_core::stage::Stage;
use pictor_core::types::JobId;

pub use retention::{spawn_sweeper, RetentionConfig};

/// Shared handle to the registry. Cheap to clone.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly-created job. The id is assumed unique (UUIDv7).
    pub async fn create(&self, job: Job) -> JobId {
        let id = job.id;
        self.inner.write().await.insert(id, job);
        id
    }

    /// Snapshot a job by id. `None` means unknown or already evicted;
    /// callers treat that as "not found", never as an error.
    pub async fn get(&self, id: JobId) -> Option<Job> {
        self.inner.read().await.get(&id).cloned()
    }

    /// Number of jobs currently tracked.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Transition a queued job to `Running` at stage 0.
    pub async fn mark_running(&self, id: JobId, message: impl Into<String>) {
        self.mutate(id, "mark_running", |job| {
            if !job.status.can_transition_to(JobStatus::Running) {
                return false;
            }
            job.status = JobStatus::Running;
            job.stage = Some(Stage::AnalyzeIntent);
            job.message = message.into();
            true
        })
        .await;
    }

    /// Record a completed stage: new stage index, the stage table's
    /// progress ceiling, and a human-readable message.
    pub async fn update_progress(
        &self,
        id: JobId,
        stage: Stage,
        progress: u8,
        message: impl Into<String>,
    ) {
        self.mutate(id, "update_progress", |job| {
            if job.status != JobStatus::Running {
                return false;
            }
            job.stage = Some(stage);
            // Progress is non-decreasing within a job's lifetime.
            job.progress = job.progress.max(progress.min(100));
            job.message = message.into();
            true
        })
        .await;
    }

    /// Terminal success: store the output image URLs, force progress to
    /// 100, and clear the stage marker.
    pub async fn complete(&self, id: JobId, images: Vec<String>, message: impl Into<String>) {
        self.mutate(id, "complete", |job| {
            if !job.status.can_transition_to(JobStatus::Completed) {
                return false;
            }
            job.status = JobStatus::Completed;
            job.stage = None;
            job.progress = 100;
            job.images = images;
            job.message = message.into();
            true
        })
        .await;
    }

    /// Terminal failure: record the error kind and detail. Valid from
    /// both `Queued` (safety rejection, cancellation) and `Running`.
    pub async fn fail(&self, id: JobId, kind: ErrorKind, detail: impl Into<String>) {
        let detail = detail.into();
        self.mutate(id, "fail", |job| {
            if !job.status.can_transition_to(JobStatus::Failed) {
                return false;
            }
            job.status = JobStatus::Failed;
            job.stage = None;
            job.message = detail.clone();
            job.error = Some(JobError {
                kind,
                detail: detail.clone(),
            });
            true
        })
        .await;
    }

    /// Remove terminal jobs whose last update is older than `ttl`.
    /// Returns the number of evicted jobs.
    pub async fn evict_expired(&self, ttl: chrono::Duration) -> usize {
        let cutoff = Utc::now() - ttl;
        let mut map = self.inner.write().await;
        let before = map.len();
        map.retain(|_, job| !(job.status.is_terminal() && job.updated_at < cutoff));
        let evicted = before - map.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted expired jobs");
        }
        evicted
    }

    /// Apply `f` to the job under the write lock. `f` returns whether the
    /// mutation was legal; illegal transitions and unknown ids are logged
    /// and dropped.
    async fn mutate<F>(&self, id: JobId, op: &'static str, f: F)
    where
        F: FnOnce(&mut Job) -> bool,
    {
        let mut map = self.inner.write().await;
        match map.get_mut(&id) {
            Some(job) => {
                if f(job) {
                    job.updated_at = Utc::now();
                } else {
                    tracing::warn!(
                        job_id = %id,
                        op,
                        status = %job.status,
                        "Dropped illegal job mutation",
                    );
                }
            }
            None => {
                tracing::warn!(job_id = %id, op, "Mutation against unknown job id");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued_job() -> Job {
        Job::queued("Request queued")
    }

    #[tokio::test]
    async fn get_unknown_id_returns_none() {
        let registry = JobRegistry::new();
        assert!(registry.get(pictor_core::types::new_job_id()).await.is_none());
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let registry = JobRegistry::new();
        let id = registry.create(queued_job()).await;
        let job = registry.get(id).await.expect("job must be reachable");
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
    }

    #[tokio::test]
    async fn progress_is_non_decreasing() {
        let registry = JobRegistry::new();
        let id = registry.create(queued_job()).await;
        registry.mark_running(id, "starting").await;

        registry
            .update_progress(id, Stage::DesignIdeation, 40, "designing")
            .await;
        assert_eq!(registry.get(id).await.unwrap().progress, 40);

        // A lower value must not move progress backwards.
        registry
            .update_progress(id, Stage::DesignIdeation, 20, "late write")
            .await;
        assert_eq!(registry.get(id).await.unwrap().progress, 40);
    }

    #[tokio::test]
    async fn progress_updates_are_ignored_unless_running() {
        let registry = JobRegistry::new();
        let id = registry.create(queued_job()).await;

        registry
            .update_progress(id, Stage::AnalyzeIntent, 20, "too early")
            .await;
        assert_eq!(registry.get(id).await.unwrap().progress, 0);
    }

    #[tokio::test]
    async fn complete_sets_terminal_state() {
        let registry = JobRegistry::new();
        let id = registry.create(queued_job()).await;
        registry.mark_running(id, "starting").await;
        registry
            .complete(id, vec!["https://img.example/a.png".into()], "done")
            .await;

        let job = registry.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.images.len(), 1);
        assert!(job.stage.is_none());
    }

    #[tokio::test]
    async fn status_never_regresses_after_terminal() {
        let registry = JobRegistry::new();
        let id = registry.create(queued_job()).await;
        registry.mark_running(id, "starting").await;
        registry.complete(id, vec![], "done").await;

        // Late failure report against a completed job is dropped.
        registry.fail(id, ErrorKind::Timeout, "too late").await;
        let job = registry.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error.is_none());

        // And a completed job cannot start running again.
        registry.mark_running(id, "again").await;
        assert_eq!(registry.get(id).await.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn queued_job_can_fail_directly() {
        let registry = JobRegistry::new();
        let id = registry.create(queued_job()).await;
        registry
            .fail(id, ErrorKind::Cancelled, "cancelled before execution")
            .await;

        let job = registry.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.unwrap().kind, ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn eviction_removes_only_stale_terminal_jobs() {
        let registry = JobRegistry::new();
        let done = registry.create(queued_job()).await;
        registry.mark_running(done, "starting").await;
        registry.complete(done, vec![], "done").await;
        let live = registry.create(queued_job()).await;

        // Nothing is older than an hour yet.
        assert_eq!(registry.evict_expired(chrono::Duration::hours(1)).await, 0);

        // With a zero TTL the terminal job goes, the queued one stays.
        assert_eq!(registry.evict_expired(chrono::Duration::zero()).await, 1);
        assert!(registry.get(done).await.is_none());
        assert!(registry.get(live).await.is_some());
    }
}
