//! Result types carried across the engine boundary.
//!
//! Everything here serializes, so the HTTP layer can hand a terminal job or
//! session to the caller verbatim. Terminal results always carry enough
//! detail (attempt trail, last instruction, last error) to diagnose a failed
//! run without server-side log access.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::StoredArtifact;

/// Lifecycle of a video generation job.
///
/// Transitions only move the job toward a terminal state: `RateLimited` is
/// always followed by another submission attempt or `Failed`, and `Done` /
/// `Failed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Polling,
    RateLimited,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// One video generation job tracked from submission to a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Identifier assigned by the remote service once a submission is
    /// accepted.
    pub id: Option<String>,
    pub prompt: String,
    pub status: JobStatus,
    /// Persisted result, present iff `status == Done`.
    pub artifact: Option<StoredArtifact>,
    /// Failure detail, present iff `status == Failed`.
    pub error: Option<String>,
    pub submission_attempts: usize,
    pub polls: usize,
}

impl GenerationJob {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: None,
            prompt: prompt.into(),
            status: JobStatus::Submitted,
            artifact: None,
            error: None,
            submission_attempts: 0,
            polls: 0,
        }
    }

    pub(crate) fn mark_done(&mut self, artifact: StoredArtifact) {
        debug_assert!(!self.status.is_terminal());
        self.status = JobStatus::Done;
        self.artifact = Some(artifact);
    }

    pub(crate) fn mark_failed(&mut self, error: impl Into<String>) {
        debug_assert!(!self.status.is_terminal());
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
    }
}

/// Verdict from the judge model on one edit attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    /// Judge confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    pub analysis: String,
    /// Instruction rewrite suggested by the judge itself, when offered.
    pub improved_instruction: Option<String>,
    /// The unparsed model reply, kept when structured parsing failed.
    pub raw_response: Option<String>,
}

impl ValidationResult {
    /// Safe default used when the judge call itself failed.
    ///
    /// Fails the validation without ending the session, so the loop can
    /// enhance and retry within its budget.
    pub(crate) fn from_call_failure(reason: impl std::fmt::Display) -> Self {
        Self {
            passed: false,
            confidence: 0.0,
            analysis: format!("validation call failed: {reason}"),
            improved_instruction: None,
            raw_response: None,
        }
    }
}

/// Instruction rewrite produced by the prompt enhancer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementResult {
    /// The instruction to use for the next attempt.
    pub instruction: String,
    pub explanation: String,
    pub key_changes: Vec<String>,
    /// True when the rewrite call failed or returned malformed output and
    /// the enhancer fell back to a minimally modified instruction.
    pub degraded: bool,
}

/// Outcome of the edit call within one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    EditFailed,
    EditSucceeded,
}

/// One edit + validate cycle inside a refinement session. Immutable once
/// appended to the session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based position in the session.
    pub sequence: usize,
    /// Instruction the edit call was issued with.
    pub instruction: String,
    pub outcome: AttemptOutcome,
    /// Edit failure reason, present iff `outcome == EditFailed`.
    pub error: Option<String>,
    /// Description returned by a successful edit call.
    pub description: Option<String>,
    pub validation: Option<ValidationResult>,
    /// Rewrite feeding the next attempt, when one was produced.
    pub enhancement: Option<EnhancementResult>,
}

impl Attempt {
    pub(crate) fn edit_failed(
        sequence: usize,
        instruction: String,
        error: String,
        enhancement: EnhancementResult,
    ) -> Self {
        Self {
            sequence,
            instruction,
            outcome: AttemptOutcome::EditFailed,
            error: Some(error),
            description: None,
            validation: None,
            enhancement: Some(enhancement),
        }
    }

    pub(crate) fn edit_succeeded(
        sequence: usize,
        instruction: String,
        description: String,
        validation: ValidationResult,
    ) -> Self {
        Self {
            sequence,
            instruction,
            outcome: AttemptOutcome::EditSucceeded,
            error: None,
            description: Some(description),
            validation: Some(validation),
            enhancement: None,
        }
    }
}

/// Terminal state of a refinement session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// An attempt passed validation above the acceptance threshold.
    Succeeded,
    /// The retry budget ran out before any attempt was accepted.
    Exhausted,
}

/// Full record of one quality-gated refinement run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementSession {
    pub id: Uuid,
    pub original_instruction: String,
    /// The last instruction tried (possibly rewritten several times).
    pub final_instruction: String,
    pub retry_budget: usize,
    pub attempts: Vec<Attempt>,
    pub outcome: SessionOutcome,
    /// Description of the accepted edit, present iff `Succeeded`.
    pub final_description: Option<String>,
    /// Persisted accepted edit, present iff `Succeeded`.
    pub final_artifact: Option<StoredArtifact>,
}

impl RefinementSession {
    pub(crate) fn new(original_instruction: impl Into<String>, retry_budget: usize) -> Self {
        let original = original_instruction.into();
        Self {
            id: Uuid::new_v4(),
            final_instruction: original.clone(),
            original_instruction: original,
            retry_budget,
            attempts: Vec::new(),
            outcome: SessionOutcome::Exhausted,
            final_description: None,
            final_artifact: None,
        }
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.len()
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == SessionOutcome::Succeeded
    }
}
