//! Job poller behavior against a scripted gateway: submission retry
//! accounting, quota exhaustion, completion validation, mirror degradation
//! and the polling budget.

use std::path::{Path, PathBuf};
use std::result::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use genmedia_orchestrator::prelude::*;

/// Gateway whose submission and polling behavior is scripted per test.
#[derive(Default)]
struct ScriptedGateway {
    /// Quota errors returned before a submission is accepted.
    submit_rate_limits: usize,
    /// `retry_after` hint carried on those quota errors.
    submit_retry_after: Option<Duration>,
    /// Fatal error returned once rate limits are exhausted, if set.
    submit_fatal: Option<String>,
    /// Quota errors returned before polls start answering.
    poll_rate_limits: usize,
    /// Successful polls (pending answers) before the final poll is returned.
    polls_until_done: usize,
    final_poll: Option<JobPoll>,
    submissions: AtomicUsize,
    poll_calls: AtomicUsize,
}

impl ScriptedGateway {
    fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaGateway for ScriptedGateway {
    async fn create_video_job(
        &self,
        _request: &VideoRequest,
    ) -> Result<JobHandle, GatewayError> {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst);
        if n < self.submit_rate_limits {
            return Err(GatewayError::RateLimited {
                retry_after: self.submit_retry_after,
            });
        }
        if let Some(message) = &self.submit_fatal {
            return Err(GatewayError::Fatal(message.clone()));
        }
        Ok(JobHandle::new("operations/op-123"))
    }

    async fn poll_job(&self, _handle: &JobHandle) -> Result<JobPoll, GatewayError> {
        let n = self.poll_calls.fetch_add(1, Ordering::SeqCst);
        if n < self.poll_rate_limits {
            return Err(GatewayError::rate_limited());
        }
        let answered = n - self.poll_rate_limits;
        if answered < self.polls_until_done {
            return Ok(JobPoll::pending());
        }
        Ok(self
            .final_poll
            .clone()
            .unwrap_or_else(|| JobPoll::completed(vec![Artifact::new(vec![7u8], "video/mp4")])))
    }

    async fn edit_image(
        &self,
        _image: &Artifact,
        _instruction: &str,
    ) -> Result<EditOutcome, GatewayError> {
        Err(GatewayError::Fatal("edit not scripted in this test".into()))
    }

    async fn judge_edit(
        &self,
        _original: &Artifact,
        _instruction: &str,
        _edit_description: &str,
    ) -> Result<String, GatewayError> {
        Err(GatewayError::Fatal("judge not scripted in this test".into()))
    }

    async fn rewrite_instruction(
        &self,
        _instruction: &str,
        _context: &str,
    ) -> Result<String, GatewayError> {
        Err(GatewayError::Fatal("rewrite not scripted in this test".into()))
    }
}

struct RejectingStore;

#[async_trait]
impl ArtifactStore for RejectingStore {
    async fn store(&self, _local_path: &Path, _object_name: &str) -> Result<String, StoreError> {
        Err(StoreError("bucket unavailable".to_string()))
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

fn fast_config() -> PollerConfig {
    PollerConfig::default()
        .with_submission_backoff(BackoffSchedule::new(Duration::ZERO, Duration::ZERO))
        .with_poll_interval(Duration::ZERO)
        .with_rate_limit_pause(Duration::ZERO)
}

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("genmedia-poller-{}", uuid::Uuid::new_v4()))
}

fn poller_with(gateway: Arc<ScriptedGateway>, dir: &Path) -> JobPoller {
    JobPoller::new(gateway, ArtifactSink::new(dir)).with_config(fast_config())
}

#[tokio::test]
async fn retries_rate_limited_submissions_then_completes() {
    init_tracing();
    let dir = scratch_dir();
    let gateway = Arc::new(ScriptedGateway {
        submit_rate_limits: 2,
        polls_until_done: 3,
        ..Default::default()
    });
    let poller = poller_with(gateway.clone(), &dir);

    let job = poller
        .submit_and_await(VideoRequest::new("a cat surfing at sunset"))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.submission_attempts, 3);
    assert_eq!(gateway.submissions(), 3);
    assert_eq!(job.polls, 4);
    assert_eq!(job.id.as_deref(), Some("operations/op-123"));

    let stored = job.artifact.unwrap();
    assert_eq!(tokio::fs::read(&stored.local_path).await.unwrap(), vec![7u8]);
    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn fails_after_submission_budget_without_polling() {
    init_tracing();
    let dir = scratch_dir();
    let gateway = Arc::new(ScriptedGateway {
        submit_rate_limits: usize::MAX,
        ..Default::default()
    });
    let poller = poller_with(gateway.clone(), &dir);

    let job = poller
        .submit_and_await(VideoRequest::new("prompt"))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.submission_attempts, 5);
    assert_eq!(gateway.submissions(), 5);
    assert_eq!(gateway.poll_calls(), 0);
    assert!(job
        .error
        .as_deref()
        .unwrap()
        .contains("max submission attempts (5)"));
}

#[tokio::test]
async fn server_retry_hint_overrides_the_backoff_schedule() {
    init_tracing();
    let dir = scratch_dir();
    let gateway = Arc::new(ScriptedGateway {
        submit_rate_limits: 2,
        submit_retry_after: Some(Duration::ZERO),
        ..Default::default()
    });
    // A schedule this slow would blow the timeout if it were consulted.
    let config = fast_config()
        .with_submission_backoff(BackoffSchedule::new(Duration::from_secs(3600), Duration::ZERO));
    let poller = JobPoller::new(gateway.clone(), ArtifactSink::new(&dir)).with_config(config);

    let job = tokio::time::timeout(
        Duration::from_secs(5),
        poller.submit_and_await(VideoRequest::new("prompt")),
    )
    .await
    .expect("hinted delay should be used instead of the schedule")
    .unwrap();

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.submission_attempts, 3);
    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn fatal_submission_error_propagates_immediately() {
    init_tracing();
    let dir = scratch_dir();
    let gateway = Arc::new(ScriptedGateway {
        submit_fatal: Some("invalid safety settings".to_string()),
        ..Default::default()
    });
    let poller = poller_with(gateway.clone(), &dir);

    let err = poller
        .submit_and_await(VideoRequest::new("prompt"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("invalid safety settings"));
    assert_eq!(gateway.submissions(), 1);
}

#[tokio::test]
async fn reference_image_request_does_not_retry_submission() {
    init_tracing();
    let dir = scratch_dir();
    let gateway = Arc::new(ScriptedGateway {
        submit_rate_limits: usize::MAX,
        ..Default::default()
    });
    let poller = poller_with(gateway.clone(), &dir);

    let request = VideoRequest::new("animate this scene")
        .with_reference_image(Artifact::new(vec![1u8, 2], "image/png"));
    let job = poller.submit_and_await(request).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.submission_attempts, 1);
    assert_eq!(gateway.submissions(), 1);
    assert_eq!(
        job.error.as_deref(),
        Some("rate limited; reference-image submissions are not retried")
    );
}

#[tokio::test]
async fn rate_limited_poll_pauses_and_resumes() {
    init_tracing();
    let dir = scratch_dir();
    let gateway = Arc::new(ScriptedGateway {
        poll_rate_limits: 2,
        polls_until_done: 1,
        ..Default::default()
    });
    let poller = poller_with(gateway.clone(), &dir);

    let job = poller
        .submit_and_await(VideoRequest::new("prompt"))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Done);
    // Two rate-limited checks plus two answered ones.
    assert_eq!(gateway.poll_calls(), 4);
    assert_eq!(job.polls, 2);
    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn completion_without_artifact_is_a_soft_failure() {
    init_tracing();
    let dir = scratch_dir();
    let gateway = Arc::new(ScriptedGateway {
        final_poll: Some(JobPoll::completed(Vec::new())),
        ..Default::default()
    });
    let poller = poller_with(gateway.clone(), &dir);

    let job = poller
        .submit_and_await(VideoRequest::new("prompt"))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error.as_deref(),
        Some("job completed without an artifact")
    );
    assert!(job.artifact.is_none());
}

#[tokio::test]
async fn remote_job_error_is_reported_not_retried() {
    init_tracing();
    let dir = scratch_dir();
    let gateway = Arc::new(ScriptedGateway {
        final_poll: Some(JobPoll::failed("content policy violation")),
        ..Default::default()
    });
    let poller = poller_with(gateway.clone(), &dir);

    let job = poller
        .submit_and_await(VideoRequest::new("prompt"))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job
        .error
        .as_deref()
        .unwrap()
        .contains("content policy violation"));
    assert_eq!(gateway.poll_calls(), 1);
}

#[tokio::test]
async fn mirror_failure_does_not_fail_the_job() {
    init_tracing();
    let dir = scratch_dir();
    let gateway = Arc::new(ScriptedGateway::default());
    let sink = ArtifactSink::new(&dir).with_store(Arc::new(RejectingStore));
    let poller = JobPoller::new(gateway, sink).with_config(fast_config());

    let job = poller
        .submit_and_await(VideoRequest::new("prompt"))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Done);
    let stored = job.artifact.unwrap();
    assert!(stored.storage_url.is_none());
    assert!(stored
        .storage_error
        .as_deref()
        .unwrap()
        .contains("bucket unavailable"));
    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn polling_budget_bounds_a_job_that_never_completes() {
    init_tracing();
    let dir = scratch_dir();
    let gateway = Arc::new(ScriptedGateway {
        polls_until_done: usize::MAX,
        ..Default::default()
    });
    let config = fast_config().with_max_poll_duration(Duration::ZERO);
    let poller = JobPoller::new(gateway, ArtifactSink::new(&dir)).with_config(config);

    let job = poller
        .submit_and_await(VideoRequest::new("prompt"))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().unwrap().contains("did not complete"));
}

#[tokio::test]
async fn invalid_request_is_rejected_before_any_remote_call() {
    init_tracing();
    let dir = scratch_dir();
    let gateway = Arc::new(ScriptedGateway::default());
    let poller = poller_with(gateway.clone(), &dir);

    let err = poller
        .submit_and_await(VideoRequest::new("prompt").with_duration_seconds(0))
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Config(_)));
    assert_eq!(gateway.submissions(), 0);
}
