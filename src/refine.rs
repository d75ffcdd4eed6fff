//! Quality-gated iterative refinement of image edits.
//!
//! Each iteration edits the image with the current instruction, has the
//! judge model score the result against the original request, and either
//! accepts the edit or rewrites the instruction for the next try. Strictly
//! sequential: every instruction depends on the previous attempt's judged
//! outcome, so there is nothing to parallelize.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::enhance::PromptEnhancer;
use crate::error::Result;
use crate::gateway::{Artifact, MediaGateway};
use crate::models::{Attempt, RefinementSession, SessionOutcome, ValidationResult};
use crate::storage::ArtifactSink;
use crate::structured;

/// Confidence a passing validation must exceed for the session to accept an
/// edit. Fixed rather than caller-tunable: biased toward fewer false accepts
/// at the cost of extra remote calls.
pub const ACCEPTANCE_THRESHOLD: f64 = 0.7;

/// Runs edit → judge → rewrite cycles until an edit is accepted or the retry
/// budget runs out.
#[derive(Clone)]
pub struct RefinementLoop {
    gateway: Arc<dyn MediaGateway>,
    enhancer: PromptEnhancer,
    sink: ArtifactSink,
}

impl RefinementLoop {
    pub fn new(gateway: Arc<dyn MediaGateway>, sink: ArtifactSink) -> Self {
        let enhancer = PromptEnhancer::new(gateway.clone());
        Self {
            gateway,
            enhancer,
            sink,
        }
    }

    /// Refine an edit of `image` until the judge accepts it or `retry_budget`
    /// attempts have been spent.
    ///
    /// Always reaches a terminal session: edit failures, judge failures and
    /// malformed replies are absorbed into the attempt log, never raised. The
    /// only `Err` cases are persisting the accepted artifact.
    #[instrument(skip(self, image), fields(budget = retry_budget))]
    pub async fn run(
        &self,
        image: &Artifact,
        original_instruction: &str,
        retry_budget: usize,
    ) -> Result<RefinementSession> {
        let retry_budget = retry_budget.max(1);
        let mut session = RefinementSession::new(original_instruction, retry_budget);
        let mut current = original_instruction.to_string();

        for sequence in 1..=retry_budget {
            debug!(sequence, instruction = %current, "starting edit attempt");

            let outcome = match self.gateway.edit_image(image, &current).await {
                Ok(outcome) if outcome.artifacts.is_empty() => {
                    // The backend answered but produced no image; treat the
                    // same as a failed edit call.
                    self.record_edit_failure(
                        &mut session,
                        sequence,
                        &mut current,
                        "edit returned no image".to_string(),
                    )
                    .await;
                    continue;
                }
                Ok(outcome) => outcome,
                Err(err) => {
                    self.record_edit_failure(&mut session, sequence, &mut current, err.to_string())
                        .await;
                    continue;
                }
            };

            let validation = self
                .judge(image, original_instruction, &outcome.description)
                .await;
            let accepted = validation.passed && validation.confidence > ACCEPTANCE_THRESHOLD;
            debug!(
                sequence,
                passed = validation.passed,
                confidence = validation.confidence,
                accepted,
                "edit judged"
            );

            let mut attempt = Attempt::edit_succeeded(
                sequence,
                current.clone(),
                outcome.description.clone(),
                validation,
            );

            if accepted {
                let stored = self
                    .sink
                    .persist(&outcome.artifacts[0], original_instruction)
                    .await?;
                session.attempts.push(attempt);
                session.outcome = SessionOutcome::Succeeded;
                session.final_instruction = current;
                session.final_description = Some(outcome.description);
                session.final_artifact = Some(stored);
                info!(
                    attempts = session.total_attempts(),
                    "refinement accepted an edit"
                );
                return Ok(session);
            }

            // Rewrite for the next try, unless this was the last one.
            if sequence < retry_budget {
                let analysis = attempt
                    .validation
                    .as_ref()
                    .map(|v| v.analysis.clone())
                    .unwrap_or_default();
                let enhancement = self.enhancer.enhance(&current, &analysis).await;
                current = enhancement.instruction.clone();
                attempt.enhancement = Some(enhancement);
            }
            session.attempts.push(attempt);
        }

        warn!(
            attempts = session.total_attempts(),
            "refinement budget exhausted without an accepted edit"
        );
        session.outcome = SessionOutcome::Exhausted;
        session.final_instruction = current;
        Ok(session)
    }

    /// A failed edit call consumes the iteration but not a validation: the
    /// failure reason goes straight to the enhancer and the rewritten
    /// instruction feeds the next attempt.
    async fn record_edit_failure(
        &self,
        session: &mut RefinementSession,
        sequence: usize,
        current: &mut String,
        reason: String,
    ) {
        warn!(sequence, reason = %reason, "edit call failed");
        let enhancement = self.enhancer.enhance(current, &reason).await;
        let next = enhancement.instruction.clone();
        session
            .attempts
            .push(Attempt::edit_failed(sequence, current.clone(), reason, enhancement));
        *current = next;
    }

    /// Judge one edit. A failed judge call degrades to a failing validation
    /// so the loop keeps running inside its budget.
    async fn judge(
        &self,
        image: &Artifact,
        original_instruction: &str,
        edit_description: &str,
    ) -> ValidationResult {
        match self
            .gateway
            .judge_edit(image, original_instruction, edit_description)
            .await
        {
            Ok(raw) => structured::parse_validation(&raw),
            Err(err) => {
                warn!(error = %err, "judge call failed; failing validation");
                ValidationResult::from_call_failure(err)
            }
        }
    }
}
