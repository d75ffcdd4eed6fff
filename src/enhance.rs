//! Stateless instruction rewriting on failure or low-confidence signals.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::gateway::MediaGateway;
use crate::models::EnhancementResult;
use crate::structured;

/// Rewrites an edit instruction given the reason the previous attempt fell
/// short. One remote call, no retry loop of its own.
#[derive(Clone)]
pub struct PromptEnhancer {
    gateway: Arc<dyn MediaGateway>,
}

impl PromptEnhancer {
    pub fn new(gateway: Arc<dyn MediaGateway>) -> Self {
        Self { gateway }
    }

    /// Produce an improved instruction.
    ///
    /// Infallible by contract: a failed or malformed rewrite degrades to the
    /// current instruction with a clarifying suffix, because a broken
    /// enhancement must not abort the refinement loop that called it.
    #[instrument(skip_all)]
    pub async fn enhance(&self, instruction: &str, context: &str) -> EnhancementResult {
        match self.gateway.rewrite_instruction(instruction, context).await {
            Ok(raw) => {
                let result = structured::parse_rewrite(&raw, instruction);
                debug!(
                    degraded = result.degraded,
                    "instruction rewrite completed"
                );
                result
            }
            Err(err) => {
                warn!(error = %err, "rewrite call failed; keeping instruction");
                structured::degraded_rewrite(
                    instruction,
                    format!("rewrite call failed: {err}"),
                )
            }
        }
    }
}
