//! Error types for the retrieval engine.
//!
//! Each subsystem has its own thiserror enum; this module ties them
//! together into the one error type engine entry points return.

use thiserror::Error;

use crate::generation::GenerationError;
use crate::store::StoreError;
use crate::vector::VectorError;

/// Main error type for engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Vector index and embedding failures.
    #[error(transparent)]
    Vector(#[from] VectorError),

    /// Relational store failures.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Generation-model failures that escape a fallback path.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Configuration problems.
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// Everything that has no structured variant yet.
    #[error("{0}")]
    General(String),
}

impl EngineError {
    /// Stable status code for JSON error envelopes.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Vector(_) => "VECTOR_ERROR",
            Self::Store(_) => "STORE_ERROR",
            Self::Generation(_) => "GENERATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::General(_) => "GENERAL_ERROR",
        }
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Helper trait for adding context to foreign errors.
pub trait ErrorContext<T> {
    /// Wraps the error with a message, keeping the original text.
    fn context(self, msg: &str) -> EngineResult<T>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: &str) -> EngineResult<T> {
        self.map_err(|e| EngineError::General(format!("{msg}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_stable() {
        let err = EngineError::Config {
            reason: "bad path".to_string(),
        };
        assert_eq!(err.status_code(), "CONFIG_ERROR");
        assert_eq!(
            EngineError::General("x".to_string()).status_code(),
            "GENERAL_ERROR"
        );
    }

    #[test]
    fn context_wraps_foreign_errors() {
        let io: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let wrapped = io.context("loading corpus");
        let message = wrapped.unwrap_err().to_string();
        assert!(message.contains("loading corpus"));
        assert!(message.contains("gone"));
    }
}
