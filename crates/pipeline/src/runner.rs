//! Pipeline runner: five ordered stages for one admitted job.
//!
//! Each stage wraps one capability call through a retry helper; after a
//! stage completes, the registry gets the stage index, the stage table's
//! progress ceiling, and a human-readable message. Transient capability
//! errors are retried with bounded exponential backoff; a permanent
//! error or exhausted retries fails the job with the stage name in the
//! detail. A per-job wall-clock timeout backstops the whole sequence
//! against a hung upstream.

use futures::future::BoxFuture;

use pictor_capability::{Capabilities, CapabilityError, FinalImage};
use pictor_core::job::ErrorKind;
use pictor_core::request::GenerationRequest;
use pictor_core::retry::{next_delay, RetryConfig};
use pictor_core::stage::Stage;
use pictor_core::types::JobId;
use pictor_registry::JobRegistry;

use crate::GenerationConfig;

/// A stage that gave up: permanent error or retries exhausted.
#[derive(Debug, thiserror::Error)]
#[error("{stage}: {detail}")]
pub struct StageFailure {
    pub stage: Stage,
    pub detail: String,
}

/// Output of a successful pipeline pass.
struct Finished {
    images: Vec<String>,
    message: String,
}

/// Executes the stage sequence for jobs holding the execution slot.
#[derive(Clone)]
pub struct PipelineRunner {
    registry: JobRegistry,
    capabilities: Capabilities,
    retry: RetryConfig,
    job_timeout: std::time::Duration,
}

impl PipelineRunner {
    pub fn new(registry: JobRegistry, capabilities: Capabilities, config: &GenerationConfig) -> Self {
        Self {
            registry,
            capabilities,
            retry: config.retry.clone(),
            job_timeout: config.job_timeout,
        }
    }

    /// Drive one job to a terminal status. Never returns an error; every
    /// outcome is written to the registry.
    pub async fn run(&self, job_id: JobId, request: GenerationRequest) {
        tracing::info!(%job_id, model = ?request.model, "Pipeline started");

        match tokio::time::timeout(self.job_timeout, self.execute(job_id, &request)).await {
            Ok(Ok(finished)) => {
                tracing::info!(%job_id, images = finished.images.len(), "Pipeline completed");
                self.registry
                    .complete(job_id, finished.images, finished.message)
                    .await;
            }
            Ok(Err(failure)) => {
                tracing::warn!(%job_id, stage = %failure.stage, detail = %failure.detail, "Pipeline failed");
                self.registry
                    .fail(job_id, ErrorKind::StagePermanent, failure.to_string())
                    .await;
            }
            Err(_) => {
                tracing::warn!(%job_id, timeout_secs = self.job_timeout.as_secs(), "Pipeline timed out");
                self.registry
                    .fail(
                        job_id,
                        ErrorKind::Timeout,
                        format!(
                            "Generation exceeded the {}s deadline",
                            self.job_timeout.as_secs()
                        ),
                    )
                    .await;
            }
        }
    }

    async fn execute(
        &self,
        job_id: JobId,
        request: &GenerationRequest,
    ) -> Result<Finished, StageFailure> {
        let caps = &self.capabilities;
        let reference = request.reference_image.as_deref();

        let intent = self
            .stage(job_id, Stage::AnalyzeIntent, || {
                caps.analyzer
                    .analyze(&request.prompt, request.model, request.creativity)
            })
            .await?;

        let proposals = self
            .stage(job_id, Stage::DesignIdeation, || {
                caps.proposer.propose(&intent, request.model, reference)
            })
            .await?;
        // Deterministic selection: proposals arrive best-first, the
        // runner always continues with the head of the sequence.
        let selected = proposals
            .into_iter()
            .next()
            .ok_or_else(|| StageFailure {
                stage: Stage::DesignIdeation,
                detail: "ideation produced no proposals".into(),
            })?;

        let prompt = self
            .stage(job_id, Stage::PromptOptimization, || {
                caps.optimizer.optimize(&selected, request.model)
            })
            .await?;

        let raw = self
            .stage(job_id, Stage::ImageRendering, || {
                caps.renderer.render(&prompt, request.render_size(), reference)
            })
            .await?;

        let images = self
            .stage(job_id, Stage::Composition, || {
                let raw = &raw;
                Box::pin(async move {
                    let final_image = match reference {
                        Some(overlay) => caps.composer.compose(raw, overlay).await?,
                        None => FinalImage::from(raw.clone()),
                    };
                    let key = format!("{job_id}.png");
                    let url = caps.store.store(&final_image, &key).await?;
                    Ok(vec![url])
                }) as BoxFuture<'_, Result<Vec<String>, CapabilityError>>
            })
            .await?;

        Ok(Finished {
            images,
            message: format!("Image generated. {}", prompt.rationale),
        })
    }

    /// Run one capability call with bounded exponential backoff, then
    /// record the stage's progress checkpoint.
    async fn stage<'a, T, F>(
        &'a self,
        job_id: JobId,
        stage: Stage,
        mut op: F,
    ) -> Result<T, StageFailure>
    where
        F: FnMut() -> BoxFuture<'a, Result<T, CapabilityError>>,
    {
        let mut attempt = 1u32;
        let mut delay = self.retry.initial_delay;

        loop {
            match op().await {
                Ok(value) => {
                    self.registry
                        .update_progress(
                            job_id,
                            stage,
                            stage.progress_ceiling(),
                            stage.completion_message(),
                        )
                        .await;
                    tracing::debug!(
                        %job_id,
                        stage = %stage,
                        progress = stage.progress_ceiling(),
                        "Stage completed",
                    );
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    tracing::warn!(
                        %job_id,
                        stage = %stage,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient stage failure, retrying",
                    );
                    tokio::time::sleep(delay).await;
                    delay = next_delay(delay, &self.retry);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(StageFailure {
                        stage,
                        detail: e.to_string(),
                    });
                }
            }
        }
    }
}
