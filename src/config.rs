//! Request and engine configuration, validated once at the boundary.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffSchedule;
use crate::error::{OrchestratorError, Result};
use crate::gateway::Artifact;

/// Recognized aspect ratios for video generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Landscape,
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Square => "1:1",
        }
    }
}

/// Recognized output resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "720p")]
    Hd720,
    #[default]
    #[serde(rename = "1080p")]
    Hd1080,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hd720 => "720p",
            Self::Hd1080 => "1080p",
        }
    }
}

/// Person-generation safety policy forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonGeneration {
    #[default]
    AllowAll,
    AllowAdult,
    DontAllow,
}

/// Parameters for one video generation job.
///
/// Replaces the ad-hoc per-call option bags of typical backend SDKs with one
/// structure whose recognized options are checked once, before any remote
/// call is made.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub duration_seconds: u32,
    pub number_of_videos: u32,
    pub person_generation: PersonGeneration,
    pub negative_prompt: Option<String>,
    /// Optional reference image. Its presence changes the request shape and
    /// disables the submission retry loop; polling is unaffected.
    pub reference_image: Option<Artifact>,
}

impl VideoRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: AspectRatio::default(),
            resolution: Resolution::default(),
            duration_seconds: 8,
            number_of_videos: 1,
            person_generation: PersonGeneration::default(),
            negative_prompt: None,
            reference_image: None,
        }
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_duration_seconds(mut self, seconds: u32) -> Self {
        self.duration_seconds = seconds;
        self
    }

    pub fn with_person_generation(mut self, policy: PersonGeneration) -> Self {
        self.person_generation = policy;
        self
    }

    /// Set a negative prompt. Blank strings are treated as absent.
    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        let text = negative_prompt.into();
        self.negative_prompt = if text.trim().is_empty() {
            None
        } else {
            Some(text.trim().to_string())
        };
        self
    }

    pub fn with_reference_image(mut self, image: Artifact) -> Self {
        self.reference_image = Some(image);
        self
    }

    /// Validate the request before submission.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(OrchestratorError::Config("prompt must not be empty".into()));
        }
        if !(1..=8).contains(&self.duration_seconds) {
            return Err(OrchestratorError::Config(format!(
                "duration_seconds must be between 1 and 8, got {}",
                self.duration_seconds
            )));
        }
        if !(1..=4).contains(&self.number_of_videos) {
            return Err(OrchestratorError::Config(format!(
                "number_of_videos must be between 1 and 4, got {}",
                self.number_of_videos
            )));
        }
        if let Some(image) = &self.reference_image {
            if image.bytes.is_empty() {
                return Err(OrchestratorError::Config(
                    "reference image must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Timing and retry knobs for [`crate::poller::JobPoller`].
///
/// Defaults match observed production behavior; tests shrink the durations to
/// zero so the retry logic runs without wall-clock delays.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Submission attempts before giving up while rate limited (default: 5).
    pub max_submission_attempts: usize,
    /// Backoff between rate-limited submission attempts.
    pub submission_backoff: BackoffSchedule,
    /// Interval between status checks (default: 10s).
    pub poll_interval: Duration,
    /// Flat pause after a rate-limited status check (default: 60s).
    pub rate_limit_pause: Duration,
    /// Overall polling budget per job (default: 30 minutes). A job that has
    /// not completed within this window fails instead of blocking forever.
    pub max_poll_duration: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_submission_attempts: 5,
            submission_backoff: BackoffSchedule::default(),
            poll_interval: Duration::from_secs(10),
            rate_limit_pause: Duration::from_secs(60),
            max_poll_duration: Duration::from_secs(30 * 60),
        }
    }
}

impl PollerConfig {
    pub fn with_max_submission_attempts(mut self, attempts: usize) -> Self {
        self.max_submission_attempts = attempts.max(1);
        self
    }

    pub fn with_submission_backoff(mut self, backoff: BackoffSchedule) -> Self {
        self.submission_backoff = backoff;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_rate_limit_pause(mut self, pause: Duration) -> Self {
        self.rate_limit_pause = pause;
        self
    }

    pub fn with_max_poll_duration(mut self, budget: Duration) -> Self {
        self.max_poll_duration = budget;
        self
    }
}
