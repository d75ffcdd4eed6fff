//! Orchestration engines for long-running, rate-limited generative media
//! calls.
//!
//! This crate turns unreliable, asynchronous, sometimes-judgmental remote
//! operations into bounded, observable local workflows:
//!
//! - [`JobPoller`] submits an asynchronous video generation job and drives
//!   it to completion: bounded submission retries with exponential backoff
//!   while the shared quota is exhausted, fixed-interval status polling with
//!   a flat pause on rate-limited checks, and local persistence plus
//!   best-effort object-storage mirroring of the result.
//! - [`RefinementLoop`] repeatedly edits an image, has a judge model score
//!   the edit against the original request, and rewrites the instruction via
//!   [`PromptEnhancer`] when the score is insufficient, bounded by a retry
//!   budget.
//!
//! Both engines talk to the backend through the [`MediaGateway`] and
//! [`ArtifactStore`](storage::ArtifactStore) traits, so tests drive them
//! with scripted fakes and deterministic backoff.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use genmedia_orchestrator::prelude::*;
//!
//! let gateway: Arc<dyn MediaGateway> = Arc::new(my_backend_client());
//! let sink = ArtifactSink::new("output/videos").with_store(Arc::new(my_bucket()));
//!
//! let poller = JobPoller::new(gateway.clone(), sink.clone());
//! let job = poller
//!     .submit_and_await(VideoRequest::new("a cat surfing at sunset"))
//!     .await?;
//! assert_eq!(job.status, JobStatus::Done);
//! ```

pub mod backoff;
pub mod config;
pub mod enhance;
pub mod error;
pub mod gateway;
pub mod models;
pub mod poller;
pub mod refine;
pub mod storage;
pub mod structured;

pub use backoff::BackoffSchedule;
pub use config::{AspectRatio, PersonGeneration, PollerConfig, Resolution, VideoRequest};
pub use enhance::PromptEnhancer;
pub use error::{OrchestratorError, Result, ResultExt};
pub use gateway::{Artifact, EditOutcome, GatewayError, JobHandle, JobPoll, MediaGateway};
pub use models::{
    Attempt, AttemptOutcome, EnhancementResult, GenerationJob, JobStatus, RefinementSession,
    SessionOutcome, ValidationResult,
};
pub use poller::JobPoller;
pub use refine::{RefinementLoop, ACCEPTANCE_THRESHOLD};
pub use storage::{ArtifactSink, ArtifactStore, StoreError, StoredArtifact};

/// Prelude module for convenient imports.
///
/// ```rust
/// use genmedia_orchestrator::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backoff::BackoffSchedule;
    pub use crate::config::{
        AspectRatio, PersonGeneration, PollerConfig, Resolution, VideoRequest,
    };
    pub use crate::enhance::PromptEnhancer;
    pub use crate::error::{OrchestratorError, Result, ResultExt};
    pub use crate::gateway::{
        Artifact, EditOutcome, GatewayError, JobHandle, JobPoll, MediaGateway,
    };
    pub use crate::models::{
        Attempt, AttemptOutcome, EnhancementResult, GenerationJob, JobStatus, RefinementSession,
        SessionOutcome, ValidationResult,
    };
    pub use crate::poller::JobPoller;
    pub use crate::refine::{RefinementLoop, ACCEPTANCE_THRESHOLD};
    pub use crate::storage::{ArtifactSink, ArtifactStore, StoreError, StoredArtifact};
}
