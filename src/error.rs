//! Errors at the gate boundary
//!
//! Business outcomes (invalid text, duplicates) are not errors; they come back
//! as [`crate::types::GateResult`]. Only infrastructure failures live here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    /// The embedder failed or timed out on every attempt
    #[error("embedding service unavailable after {attempts} attempt(s): {reason}")]
    EmbeddingUnavailable { attempts: u32, reason: String },

    /// The corpus is not in a state the gate can reason about
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),
}

impl GateError {
    /// HTTP status code the error should surface as
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::EmbeddingUnavailable { .. } => 503,
            GateError::InternalInconsistency(_) => 500,
        }
    }

    /// Whether a client may retry the same submission later
    pub fn is_retryable(&self) -> bool {
        matches!(self, GateError::EmbeddingUnavailable { .. })
    }
}
