//! Parse-or-degrade helpers for structured model replies.
//!
//! The judge and the prompt rewriter are both asked for JSON, and both
//! routinely return it wrapped in code fences or prose. Parsing lives here in
//! one place: extract the outermost JSON object, deserialize leniently, and
//! on failure degrade to a safe default at the call site. A malformed reply
//! must never abort the refinement loop.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use crate::models::{EnhancementResult, ValidationResult};

/// Suffix appended to an instruction when the rewriter could not produce a
/// usable improvement.
const FALLBACK_SUFFIX: &str = "(be specific about the desired visual outcome)";

/// Strip fences and prose, keeping the outermost `{ ... }` span.
fn extract_json_object(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                return &trimmed[start..=end];
            }
        }
    }
    trimmed
}

/// Deserialize a model reply, tolerating fences and surrounding text.
pub fn parse_reply<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(extract_json_object(raw))
}

#[derive(Debug, Deserialize)]
struct JudgeReply {
    #[serde(default)]
    passed: bool,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    analysis: String,
    #[serde(default)]
    improved_instruction: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RewriteReply {
    instruction: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    key_changes: Vec<String>,
}

/// Parse a judge reply into a [`ValidationResult`].
///
/// A reply that cannot be parsed degrades to a failing validation with
/// middling confidence and the raw text preserved, keeping the session
/// running instead of crashing it.
pub fn parse_validation(raw: &str) -> ValidationResult {
    match parse_reply::<JudgeReply>(raw) {
        Ok(reply) => ValidationResult {
            passed: reply.passed,
            confidence: reply.confidence.clamp(0.0, 1.0),
            analysis: reply.analysis,
            improved_instruction: reply.improved_instruction,
            raw_response: None,
        },
        Err(err) => {
            warn!(error = %err, "judge reply was not valid JSON; failing validation");
            ValidationResult {
                passed: false,
                confidence: 0.5,
                analysis: "could not parse the judge reply as structured output".to_string(),
                improved_instruction: None,
                raw_response: Some(raw.to_string()),
            }
        }
    }
}

/// Parse a rewrite reply into an [`EnhancementResult`].
///
/// An unparseable reply degrades to the current instruction with a generic
/// clarifying suffix so the next attempt is at least not a verbatim repeat.
pub fn parse_rewrite(raw: &str, current_instruction: &str) -> EnhancementResult {
    match parse_reply::<RewriteReply>(raw) {
        Ok(reply) if !reply.instruction.trim().is_empty() => EnhancementResult {
            instruction: reply.instruction,
            explanation: reply.explanation,
            key_changes: reply.key_changes,
            degraded: false,
        },
        Ok(_) => degraded_rewrite(current_instruction, "rewrite reply had an empty instruction"),
        Err(err) => {
            warn!(error = %err, "rewrite reply was not valid JSON; keeping instruction");
            degraded_rewrite(
                current_instruction,
                "could not parse the rewrite reply as structured output",
            )
        }
    }
}

pub(crate) fn degraded_rewrite(
    current_instruction: &str,
    explanation: impl Into<String>,
) -> EnhancementResult {
    EnhancementResult {
        instruction: format!("{current_instruction} {FALLBACK_SUFFIX}"),
        explanation: explanation.into(),
        key_changes: Vec::new(),
        degraded: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_judge_reply() {
        let raw = r#"Here is my assessment:
```json
{"passed": true, "confidence": 0.92, "analysis": "The sky is now purple as requested."}
```"#;
        let validation = parse_validation(raw);
        assert!(validation.passed);
        assert!((validation.confidence - 0.92).abs() < f64::EPSILON);
        assert!(validation.raw_response.is_none());
    }

    #[test]
    fn malformed_judge_reply_degrades_to_failing_validation() {
        let validation = parse_validation("I think it looks great!");
        assert!(!validation.passed);
        assert!((validation.confidence - 0.5).abs() < f64::EPSILON);
        assert_eq!(
            validation.raw_response.as_deref(),
            Some("I think it looks great!")
        );
    }

    #[test]
    fn out_of_range_confidence_is_clamped() {
        let validation = parse_validation(r#"{"passed": true, "confidence": 3.5}"#);
        assert!((validation.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_rewrite_reply() {
        let raw = r#"{"instruction": "Turn the sky deep violet at dusk",
                      "explanation": "added color and time of day",
                      "key_changes": ["color", "time of day"]}"#;
        let rewrite = parse_rewrite(raw, "make the sky purple");
        assert!(!rewrite.degraded);
        assert_eq!(rewrite.instruction, "Turn the sky deep violet at dusk");
        assert_eq!(rewrite.key_changes.len(), 2);
    }

    #[test]
    fn malformed_rewrite_keeps_instruction_with_suffix() {
        let rewrite = parse_rewrite("sorry, I cannot do that", "make the sky purple");
        assert!(rewrite.degraded);
        assert!(rewrite.instruction.starts_with("make the sky purple"));
        assert_ne!(rewrite.instruction, "make the sky purple");
    }

    #[test]
    fn empty_rewrite_instruction_degrades() {
        let rewrite = parse_rewrite(r#"{"instruction": "   "}"#, "original");
        assert!(rewrite.degraded);
    }
}
