//! Error types for the graph engine and the generator boundary.
//!
//! [`GraphError`] is what every [`GraphController`](crate::GraphController) operation
//! returns. Generator failures arrive as [`GeneratorError`] and are surfaced to the
//! caller as [`GraphError::GenerationFailed`]; the controller never retries them.

use std::time::Duration;

use thiserror::Error;

/// Errors from one call into a [`ThoughtGenerator`](crate::ThoughtGenerator).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeneratorError {
    /// The generator reported a failure (network, provider, parse...).
    #[error("generator failed: {0}")]
    Failed(String),
    /// The caller's cancellation token fired while the call was in flight.
    #[error("generator call cancelled")]
    Cancelled,
    /// The call exceeded the controller's configured generator timeout.
    #[error("generator call timed out after {0:?}")]
    TimedOut(Duration),
    /// The generator answered, but with nothing usable (e.g. zero continuations).
    #[error("malformed generator output: {0}")]
    Malformed(String),
}

/// Errors returned by graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Unknown graph id or vertex id.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },
    /// Initialize called with a graph id that is registered or retired.
    #[error("graph already exists: {0}")]
    AlreadyExists(String),
    /// Structural or validation failure, detected before any generator call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The injected generator errored, timed out or was cancelled.
    #[error("generation failed: {0}")]
    GenerationFailed(#[from] GeneratorError),
    /// A configured capacity limit (vertices, refinements, active set) would be exceeded.
    #[error("limit reached: {0}")]
    LimitReached(String),
}

impl GraphError {
    pub(crate) fn graph_not_found(id: &str) -> Self {
        Self::NotFound {
            what: "graph",
            id: id.to_string(),
        }
    }

    pub(crate) fn vertex_not_found(id: &str) -> Self {
        Self::NotFound {
            what: "vertex",
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Stable snake_case name of the error kind, used in protocol error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::GenerationFailed(_) => "generation_failed",
            Self::LimitReached(_) => "limit_reached",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_what_was_missing() {
        let err = GraphError::vertex_not_found("g-v3");
        assert_eq!(err.to_string(), "vertex not found: g-v3");
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn generator_error_converts_into_generation_failed() {
        let err: GraphError = GeneratorError::Cancelled.into();
        assert!(matches!(
            err,
            GraphError::GenerationFailed(GeneratorError::Cancelled)
        ));
        assert_eq!(err.kind(), "generation_failed");
        assert_eq!(err.to_string(), "generation failed: generator call cancelled");
    }
}
