//! Remote operation gateway: the seam between the engines and the generative
//! media backend.
//!
//! The engines never talk to a concrete client. They hold an
//! `Arc<dyn MediaGateway>` so production code can wire in an HTTP-backed
//! implementation while tests inject scripted fakes. The gateway reports
//! quota exhaustion as a typed [`GatewayError::RateLimited`] variant rather
//! than leaving callers to sniff "429" substrings out of error messages.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::VideoRequest;

/// Errors surfaced by a gateway implementation.
///
/// The split matters: `RateLimited` is the only retryable condition, and the
/// engines handle it with bounded backoff. Everything else is `Fatal` and
/// propagates verbatim.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The remote service rejected the call because throughput was exceeded.
    ///
    /// `retry_after` carries the server's hint when one was present in the
    /// response; the backoff schedule is used otherwise.
    #[error("rate limited by remote service")]
    RateLimited { retry_after: Option<Duration> },

    /// Any non-quota remote failure. Not retried.
    #[error("remote service error: {0}")]
    Fatal(String),
}

impl GatewayError {
    pub fn rate_limited() -> Self {
        Self::RateLimited { retry_after: None }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Opaque handle to a long-running remote job, assigned by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: String,
}

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Raw media payload moving across the gateway boundary.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Artifact {
    pub fn new(bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }
}

impl std::fmt::Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifact")
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// One status check of a long-running job.
#[derive(Debug, Clone, Default)]
pub struct JobPoll {
    pub done: bool,
    pub artifacts: Vec<Artifact>,
    /// Error detail reported by the service for a job that finished badly.
    pub error: Option<String>,
}

impl JobPoll {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn completed(artifacts: Vec<Artifact>) -> Self {
        Self {
            done: true,
            artifacts,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            done: true,
            artifacts: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Result of a synchronous image edit call.
///
/// An empty `artifacts` list is how the backend signals an edit that produced
/// no image; the refinement loop treats that as a failed attempt.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub description: String,
    pub artifacts: Vec<Artifact>,
}

/// Async client abstraction over the generative media service.
///
/// Implementations own transport concerns (authentication, timeouts,
/// serialization of the actual wire protocol). The engines only rely on the
/// error taxonomy: `RateLimited` vs `Fatal`.
#[async_trait]
pub trait MediaGateway: Send + Sync {
    /// Submit a video generation job. Returns quickly with a handle; the job
    /// completes asynchronously and is observed via [`Self::poll_job`].
    async fn create_video_job(
        &self,
        request: &VideoRequest,
    ) -> std::result::Result<JobHandle, GatewayError>;

    /// Check the status of a previously submitted job. Idempotent.
    async fn poll_job(&self, handle: &JobHandle)
        -> std::result::Result<JobPoll, GatewayError>;

    /// Apply an instruction to an image and return the edited result.
    async fn edit_image(
        &self,
        image: &Artifact,
        instruction: &str,
    ) -> std::result::Result<EditOutcome, GatewayError>;

    /// Ask the judge model whether an edit satisfied the original
    /// instruction. Returns the raw model reply; parsing (and degradation on
    /// malformed output) happens in [`crate::structured`].
    async fn judge_edit(
        &self,
        original: &Artifact,
        instruction: &str,
        edit_description: &str,
    ) -> std::result::Result<String, GatewayError>;

    /// Ask the rewrite model for an improved instruction given a failure or
    /// low-confidence signal. Returns the raw model reply.
    async fn rewrite_instruction(
        &self,
        instruction: &str,
        context: &str,
    ) -> std::result::Result<String, GatewayError>;
}
