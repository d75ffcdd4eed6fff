//! Long-running job poller with quota-aware backoff.
//!
//! Drives one video generation job from submission to a terminal state:
//! bounded submission retries with exponential backoff while rate limited,
//! then fixed-interval status polling (with a flat pause on rate-limited
//! checks) until the job completes, fails, or exceeds its polling budget.
//! The completed artifact is persisted locally and mirrored to object
//! storage.

use std::sync::Arc;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use crate::config::{PollerConfig, VideoRequest};
use crate::error::Result;
use crate::gateway::{GatewayError, JobHandle, MediaGateway};
use crate::models::{GenerationJob, JobStatus};
use crate::storage::ArtifactSink;

/// Submits generation requests and drives them to completion.
///
/// Terminal soft failures (submission budget exhausted, job completed
/// without an artifact, polling budget exceeded, remote-reported job error)
/// come back as a `Failed` [`GenerationJob`] carrying the failure detail.
/// Only non-quota gateway errors and local I/O failures return `Err`.
#[derive(Clone)]
pub struct JobPoller {
    gateway: Arc<dyn MediaGateway>,
    sink: ArtifactSink,
    config: PollerConfig,
}

impl JobPoller {
    pub fn new(gateway: Arc<dyn MediaGateway>, sink: ArtifactSink) -> Self {
        Self {
            gateway,
            sink,
            config: PollerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PollerConfig) -> Self {
        self.config = config;
        self
    }

    /// Submit a generation request and await its terminal state.
    #[instrument(skip_all, fields(prompt = %request.prompt))]
    pub async fn submit_and_await(&self, request: VideoRequest) -> Result<GenerationJob> {
        request.validate()?;

        let mut job = GenerationJob::new(request.prompt.clone());
        let handle = match self.submit(&request, &mut job).await? {
            Some(handle) => handle,
            // Submission budget exhausted; the job already records why.
            None => return Ok(job),
        };

        info!(job_id = %handle.id, "submission accepted, polling");
        self.poll_to_completion(&handle, &mut job).await?;
        Ok(job)
    }

    /// Submission phase. Retries rate-limited submissions with backoff, up
    /// to the configured ceiling. A request carrying a reference image is
    /// submitted exactly once: its payload is large enough that replaying it
    /// on quota pressure is not worthwhile, so a rate limit is reported to
    /// the caller instead.
    async fn submit(
        &self,
        request: &VideoRequest,
        job: &mut GenerationJob,
    ) -> Result<Option<JobHandle>> {
        let max_attempts = if request.reference_image.is_some() {
            1
        } else {
            self.config.max_submission_attempts
        };

        for attempt in 0..max_attempts {
            job.submission_attempts += 1;
            debug!(
                attempt = attempt + 1,
                max_attempts, "submitting generation job"
            );

            match self.gateway.create_video_job(request).await {
                Ok(handle) => {
                    job.id = Some(handle.id.clone());
                    job.status = JobStatus::Polling;
                    return Ok(Some(handle));
                }
                Err(GatewayError::RateLimited { retry_after }) => {
                    job.status = JobStatus::RateLimited;
                    if attempt + 1 == max_attempts {
                        break;
                    }
                    let delay = retry_after
                        .unwrap_or_else(|| self.config.submission_backoff.delay(attempt as u32));
                    warn!(
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs(),
                        "submission rate limited, backing off"
                    );
                    sleep(delay).await;
                    job.status = JobStatus::Submitted;
                }
                Err(err @ GatewayError::Fatal(_)) => return Err(err.into()),
            }
        }

        warn!(attempts = job.submission_attempts, "submission budget exhausted");
        if request.reference_image.is_some() {
            job.mark_failed("rate limited; reference-image submissions are not retried");
        } else {
            job.mark_failed(format!(
                "max submission attempts ({}) reached while rate limited",
                job.submission_attempts
            ));
        }
        Ok(None)
    }

    /// Polling phase. Status checks are idempotent, so a rate-limited check
    /// pauses flat (no exponential growth) and resumes. The overall phase is
    /// bounded by `max_poll_duration` so a job that never completes cannot
    /// block its caller indefinitely.
    async fn poll_to_completion(
        &self,
        handle: &JobHandle,
        job: &mut GenerationJob,
    ) -> Result<()> {
        let deadline = Instant::now() + self.config.max_poll_duration;

        loop {
            if Instant::now() >= deadline {
                warn!(job_id = %handle.id, polls = job.polls, "polling budget exceeded");
                job.mark_failed(format!(
                    "job did not complete within {}s of polling",
                    self.config.max_poll_duration.as_secs()
                ));
                return Ok(());
            }

            sleep(self.config.poll_interval).await;

            let poll = match self.gateway.poll_job(handle).await {
                Ok(poll) => {
                    job.polls += 1;
                    poll
                }
                Err(GatewayError::RateLimited { .. }) => {
                    debug!(job_id = %handle.id, "rate limited while polling, pausing");
                    sleep(self.config.rate_limit_pause).await;
                    continue;
                }
                Err(err @ GatewayError::Fatal(_)) => return Err(err.into()),
            };

            if !poll.done {
                continue;
            }

            if let Some(remote_error) = poll.error {
                job.mark_failed(format!("job failed remotely: {remote_error}"));
                return Ok(());
            }

            // The remote side declared the job finished, so an empty result
            // set is reported rather than retried.
            let Some(artifact) = poll.artifacts.first() else {
                warn!(job_id = %handle.id, "job completed without an artifact");
                job.mark_failed("job completed without an artifact");
                return Ok(());
            };

            let stored = self.sink.persist(artifact, &job.prompt).await?;
            info!(
                job_id = %handle.id,
                polls = job.polls,
                path = %stored.local_path.display(),
                mirrored = stored.is_mirrored(),
                "job completed"
            );
            job.mark_done(stored);
            return Ok(());
        }
    }
}
