use thiserror::Error;

use crate::gateway::GatewayError;

/// Detailed error types for orchestration operations.
///
/// Most remote-call failures never surface here: quota errors are retried,
/// judge/enhancer parse failures degrade to safe defaults, and storage mirror
/// failures are recorded on the result. Only fatal remote errors, local I/O
/// and invalid configuration cross the engine boundary.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Context(String),
}

impl OrchestratorError {
    /// Check if this error is a quota signal that the engines would retry.
    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            Self::Gateway(GatewayError::RateLimited { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn with_context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<OrchestratorError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let base_err = e.into();
            OrchestratorError::Context(format!("{}: {}", context.into(), base_err))
        })
    }
}
