//! Admission gate: global single-flight execution with FIFO queueing.
//!
//! The execution slot is a strict mutual-exclusion resource guarded by
//! this gate. It is acquired only when a job transitions from `queued`
//! to `running` and released exactly once, when that job's runner
//! reports a terminal status; release promotes the head of the FIFO
//! wait list. The in-process gate is the shipped strategy; a deployment
//! spanning several processes would back the same surface with a
//! distributed lock instead.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;

use pictor_capability::{Capabilities, Verdict};
use pictor_core::error::CoreError;
use pictor_core::job::{ErrorKind, Job, JobStatus};
use pictor_core::request::{validate_request, GenerationRequest};
use pictor_core::types::JobId;
use pictor_registry::JobRegistry;

use crate::runner::PipelineRunner;
use crate::GenerationConfig;

/// Outcome of a successful submission.
#[derive(Debug, Clone)]
pub struct SubmitTicket {
    pub job_id: JobId,
    /// `Running` when the slot was free, `Queued` otherwise.
    pub status: JobStatus,
    pub message: String,
}

/// Rejections surfaced synchronously at submission time.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Request failed validation; no job created.
    #[error(transparent)]
    Invalid(CoreError),

    /// Content-safety rejection. A job id is still issued so the client
    /// can poll the terminally-failed job.
    #[error("Prompt rejected by content-safety check: {reason}")]
    Unsafe { job_id: JobId, reason: String },

    /// Wait list is at capacity; no job created.
    #[error("Generation queue is full ({queued}/{capacity}), try again later")]
    Busy { queued: usize, capacity: usize },

    /// The safety checker itself was unreachable.
    #[error("Content-safety check unavailable: {0}")]
    Internal(String),
}

struct Waiter {
    job_id: JobId,
    request: GenerationRequest,
}

#[derive(Default)]
struct GateState {
    /// Job currently holding the execution slot, if any.
    slot: Option<JobId>,
    /// FIFO wait list behind the slot.
    waiting: VecDeque<Waiter>,
}

/// Accepts, queues, or rejects incoming generation requests.
pub struct AdmissionGate {
    registry: JobRegistry,
    capabilities: Capabilities,
    runner: PipelineRunner,
    queue_capacity: usize,
    state: Mutex<GateState>,
}

impl AdmissionGate {
    pub fn new(
        registry: JobRegistry,
        capabilities: Capabilities,
        config: GenerationConfig,
    ) -> Arc<Self> {
        let runner = PipelineRunner::new(registry.clone(), capabilities.clone(), &config);
        Arc::new(Self {
            registry,
            capabilities,
            runner,
            queue_capacity: config.queue_capacity,
            state: Mutex::new(GateState::default()),
        })
    }

    /// Validate, safety-check, and admit one request.
    pub async fn submit(self: &Arc<Self>, request: GenerationRequest) -> Result<SubmitTicket, GateError> {
        validate_request(&request).map_err(GateError::Invalid)?;

        // Synchronous content-safety check on the full prompt, before
        // any queueing decision.
        match self.capabilities.safety.check(&request.prompt).await {
            Ok(Verdict::Allowed) => {}
            Ok(Verdict::Blocked { reason }) => {
                let job = Job::rejected(
                    ErrorKind::Unsafe,
                    format!("Prompt rejected by content-safety check: {reason}"),
                );
                let job_id = self.registry.create(job).await;
                tracing::warn!(%job_id, %reason, "Admission rejected: unsafe prompt");
                return Err(GateError::Unsafe { job_id, reason });
            }
            Err(e) => return Err(GateError::Internal(e.to_string())),
        }

        let mut state = self.state.lock().await;

        if state.slot.is_some() && state.waiting.len() >= self.queue_capacity {
            let queued = state.waiting.len();
            drop(state);
            tracing::warn!(queued, capacity = self.queue_capacity, "Admission rejected: busy");
            return Err(GateError::Busy {
                queued,
                capacity: self.queue_capacity,
            });
        }

        if state.slot.is_none() {
            // Slot is free: promote immediately.
            let job = Job::queued("Generation starting");
            let job_id = self.registry.create(job).await;
            state.slot = Some(job_id);
            drop(state);

            self.registry.mark_running(job_id, "Analysing request intent").await;
            tracing::info!(%job_id, "Admission accepted: running immediately");
            self.spawn_runner(job_id, request);

            Ok(SubmitTicket {
                job_id,
                status: JobStatus::Running,
                message: "Generation started".to_string(),
            })
        } else {
            // Slot occupied: join the FIFO wait list.
            let position = state.waiting.len() + 1;
            let job = Job::queued(format!("Waiting for the generation slot (position {position})"));
            let job_id = self.registry.create(job).await;
            state.waiting.push_back(Waiter { job_id, request });
            drop(state);

            tracing::info!(%job_id, position, "Admission accepted: queued");
            Ok(SubmitTicket {
                job_id,
                status: JobStatus::Queued,
                message: format!("Request queued at position {position}"),
            })
        }
    }

    /// Remove a still-waiting job from the FIFO list. Returns `false`
    /// when the job is unknown, already running, or terminal.
    pub async fn cancel_queued(&self, job_id: JobId) -> bool {
        let mut state = self.state.lock().await;
        let Some(position) = state.waiting.iter().position(|w| w.job_id == job_id) else {
            return false;
        };
        state.waiting.remove(position);
        drop(state);

        self.registry
            .fail(job_id, ErrorKind::Cancelled, "Cancelled before execution")
            .await;
        tracing::info!(%job_id, "Queued job cancelled");
        true
    }

    /// Number of jobs currently waiting behind the slot.
    pub async fn queue_depth(&self) -> usize {
        self.state.lock().await.waiting.len()
    }

    /// Release the execution slot and promote the next waiter, if any.
    /// Called exactly once per admitted job, after its terminal write.
    async fn release(self: &Arc<Self>, finished: JobId) {
        let mut state = self.state.lock().await;
        debug_assert_eq!(state.slot, Some(finished));
        state.slot = None;

        if let Some(next) = state.waiting.pop_front() {
            state.slot = Some(next.job_id);
            drop(state);

            self.registry
                .mark_running(next.job_id, "Analysing request intent")
                .await;
            tracing::info!(job_id = %next.job_id, "Promoted from queue");
            self.spawn_runner(next.job_id, next.request);
        }
    }

    /// Run the pipeline for the job holding the slot, then release it.
    fn spawn_runner(self: &Arc<Self>, job_id: JobId, request: GenerationRequest) {
        let gate = Arc::clone(self);
        tokio::spawn(async move {
            gate.runner.run(job_id, request).await;
            gate.release(job_id).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use pictor_capability::stub::{self, stub_capabilities};
    use pictor_capability::{CapabilityError, ImageRenderer, RawImage, RenderPrompt};
    use pictor_core::retry::RetryConfig;

    fn fast_config() -> GenerationConfig {
        GenerationConfig {
            queue_capacity: 2,
            retry: RetryConfig {
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                multiplier: 2.0,
                max_attempts: 3,
            },
            job_timeout: Duration::from_secs(10),
        }
    }

    async fn wait_terminal(registry: &JobRegistry, id: JobId) -> Job {
        for _ in 0..500 {
            if let Some(job) = registry.get(id).await {
                if job.status.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("job {id} never reached a terminal status");
    }

    /// Renderer that fails a configurable number of times before
    /// succeeding (or forever, when `failures` is large).
    struct FlakyRenderer {
        failures: u32,
        transient: bool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ImageRenderer for FlakyRenderer {
        async fn render(
            &self,
            _prompt: &RenderPrompt,
            size: &str,
            _reference: Option<&[u8]>,
        ) -> Result<RawImage, CapabilityError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                if self.transient {
                    Err(CapabilityError::Transient("upstream 503".into()))
                } else {
                    Err(CapabilityError::Permanent("upstream rejected prompt".into()))
                }
            } else {
                Ok(RawImage {
                    bytes: stub::TINY_PNG.to_vec(),
                    size: size.to_string(),
                })
            }
        }
    }

    #[tokio::test]
    async fn idle_submission_runs_immediately_and_completes() {
        let registry = JobRegistry::new();
        let gate = AdmissionGate::new(registry.clone(), stub_capabilities(), fast_config());

        let ticket = gate
            .submit(GenerationRequest::new("画一只猫"))
            .await
            .expect("benign prompt must be admitted");
        assert_eq!(ticket.status, JobStatus::Running);

        let job = wait_terminal(&registry, ticket.job_id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.images.len(), 1);
        assert!(job.images[0].starts_with("https://images.test/"));
    }

    #[tokio::test]
    async fn unsafe_prompt_fails_before_any_stage() {
        let registry = JobRegistry::new();
        let gate = AdmissionGate::new(registry.clone(), stub_capabilities(), fast_config());

        let err = gate
            .submit(GenerationRequest::new("画一个炸弹"))
            .await
            .expect_err("blocked prompt must be rejected");

        let GateError::Unsafe { job_id, .. } = err else {
            panic!("expected an unsafe rejection, got {err}");
        };

        let job = registry.get(job_id).await.expect("rejected job is polled by id");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 0);
        assert!(job.images.is_empty());
        assert_eq!(job.error.unwrap().kind, ErrorKind::Unsafe);
    }

    #[tokio::test]
    async fn invalid_request_creates_no_job() {
        let registry = JobRegistry::new();
        let gate = AdmissionGate::new(registry.clone(), stub_capabilities(), fast_config());

        let mut request = GenerationRequest::new("a cat");
        request.creativity = 5.0;
        let err = gate.submit(request).await.expect_err("out-of-bounds creativity");
        assert_matches!(err, GateError::Invalid(CoreError::Validation(_)));
        assert!(registry.is_empty().await);
    }

    /// Renderer that parks until told to finish, to hold the slot open.
    struct GatedRenderer {
        release: tokio::sync::Semaphore,
    }

    #[async_trait]
    impl ImageRenderer for GatedRenderer {
        async fn render(
            &self,
            _prompt: &RenderPrompt,
            size: &str,
            _reference: Option<&[u8]>,
        ) -> Result<RawImage, CapabilityError> {
            let _permit = self.release.acquire().await.map_err(|e| {
                CapabilityError::Permanent(e.to_string())
            })?;
            Ok(RawImage {
                bytes: stub::TINY_PNG.to_vec(),
                size: size.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn submissions_behind_the_slot_queue_fifo_and_promote_in_order() {
        let registry = JobRegistry::new();
        let renderer = Arc::new(GatedRenderer {
            release: tokio::sync::Semaphore::new(0),
        });
        let mut caps = stub_capabilities();
        caps.renderer = renderer.clone();
        let gate = AdmissionGate::new(registry.clone(), caps, fast_config());

        let first = gate.submit(GenerationRequest::new("first")).await.unwrap();
        assert_eq!(first.status, JobStatus::Running);

        let second = gate.submit(GenerationRequest::new("second")).await.unwrap();
        let third = gate.submit(GenerationRequest::new("third")).await.unwrap();
        assert_eq!(second.status, JobStatus::Queued);
        assert_eq!(third.status, JobStatus::Queued);
        assert_eq!(gate.queue_depth().await, 2);

        // Queue capacity is 2: a fourth arrival is rejected, no job created.
        let jobs_before = registry.len().await;
        let err = gate.submit(GenerationRequest::new("fourth")).await.unwrap_err();
        assert_matches!(err, GateError::Busy { queued: 2, capacity: 2 });
        assert_eq!(registry.len().await, jobs_before);

        // While the first job renders, the others must still be queued.
        assert_eq!(registry.get(second.job_id).await.unwrap().status, JobStatus::Queued);

        // Let all renders through and watch promotion order.
        renderer.release.add_permits(3);
        let a = wait_terminal(&registry, first.job_id).await;
        let b = wait_terminal(&registry, second.job_id).await;
        let c = wait_terminal(&registry, third.job_id).await;
        assert_eq!(a.status, JobStatus::Completed);
        assert_eq!(b.status, JobStatus::Completed);
        assert_eq!(c.status, JobStatus::Completed);

        // FIFO: completion timestamps respect submission order.
        assert!(a.updated_at <= b.updated_at);
        assert!(b.updated_at <= c.updated_at);
    }

    #[tokio::test]
    async fn transient_render_failures_are_retried_to_success() {
        let registry = JobRegistry::new();
        let mut caps = stub_capabilities();
        caps.renderer = Arc::new(FlakyRenderer {
            failures: 2,
            transient: true,
            calls: AtomicU32::new(0),
        });
        let gate = AdmissionGate::new(registry.clone(), caps, fast_config());

        let ticket = gate.submit(GenerationRequest::new("a cat")).await.unwrap();
        let job = wait_terminal(&registry, ticket.job_id).await;
        // Two transient failures fit inside max_attempts = 3.
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_the_job_and_free_the_slot() {
        let registry = JobRegistry::new();
        let mut caps = stub_capabilities();
        caps.renderer = Arc::new(FlakyRenderer {
            failures: u32::MAX,
            transient: true,
            calls: AtomicU32::new(0),
        });
        let gate = AdmissionGate::new(registry.clone(), caps, fast_config());

        let doomed = gate.submit(GenerationRequest::new("doomed")).await.unwrap();
        let queued = gate.submit(GenerationRequest::new("survivor")).await.unwrap();

        let failed = wait_terminal(&registry, doomed.job_id).await;
        assert_eq!(failed.status, JobStatus::Failed);
        let error = failed.error.expect("failed job carries an error");
        assert_eq!(error.kind, ErrorKind::StagePermanent);
        assert!(error.detail.contains("Image rendering"));
        assert!(failed.images.is_empty());

        // Slot release promoted the waiter even though its renderer also
        // fails; it must reach a terminal state on its own.
        let next = wait_terminal(&registry, queued.job_id).await;
        assert_eq!(next.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn permanent_render_failure_is_not_retried() {
        let registry = JobRegistry::new();
        let renderer = Arc::new(FlakyRenderer {
            failures: u32::MAX,
            transient: false,
            calls: AtomicU32::new(0),
        });
        let mut caps = stub_capabilities();
        caps.renderer = renderer.clone();
        let gate = AdmissionGate::new(registry.clone(), caps, fast_config());

        let ticket = gate.submit(GenerationRequest::new("a cat")).await.unwrap();
        let job = wait_terminal(&registry, ticket.job_id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn job_timeout_fails_with_timeout_kind() {
        let registry = JobRegistry::new();
        let mut caps = stub_capabilities();
        // Renderer that never finishes.
        caps.renderer = Arc::new(GatedRenderer {
            release: tokio::sync::Semaphore::new(0),
        });
        let mut config = fast_config();
        config.job_timeout = Duration::from_millis(50);
        let gate = AdmissionGate::new(registry.clone(), caps, config);

        let ticket = gate.submit(GenerationRequest::new("a cat")).await.unwrap();
        let job = wait_terminal(&registry, ticket.job_id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.unwrap().kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn queued_job_can_be_cancelled_but_running_cannot() {
        let registry = JobRegistry::new();
        let renderer = Arc::new(GatedRenderer {
            release: tokio::sync::Semaphore::new(0),
        });
        let mut caps = stub_capabilities();
        caps.renderer = renderer.clone();
        let gate = AdmissionGate::new(registry.clone(), caps, fast_config());

        let running = gate.submit(GenerationRequest::new("running")).await.unwrap();
        let waiting = gate.submit(GenerationRequest::new("waiting")).await.unwrap();

        assert!(!gate.cancel_queued(running.job_id).await);
        assert!(gate.cancel_queued(waiting.job_id).await);
        assert!(!gate.cancel_queued(waiting.job_id).await);

        let cancelled = registry.get(waiting.job_id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Failed);
        assert_eq!(cancelled.error.unwrap().kind, ErrorKind::Cancelled);

        // The running job is unaffected and still completes.
        renderer.release.add_permits(1);
        let done = wait_terminal(&registry, running.job_id).await;
        assert_eq!(done.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn progress_checkpoints_follow_the_stage_table() {
        let registry = JobRegistry::new();
        let gate = AdmissionGate::new(registry.clone(), stub_capabilities(), fast_config());

        let ticket = gate.submit(GenerationRequest::new("a cat")).await.unwrap();
        let id = ticket.job_id;

        // Sample progress while the job runs; every observation must be
        // one of the table's checkpoints and non-decreasing.
        let checkpoints = [0u8, 20, 40, 60, 85, 100];
        let mut last = 0u8;
        loop {
            let job = registry.get(id).await.unwrap();
            assert!(checkpoints.contains(&job.progress), "unexpected progress {}", job.progress);
            assert!(job.progress >= last, "progress regressed");
            last = job.progress;
            if job.status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(last, 100);
    }
}
