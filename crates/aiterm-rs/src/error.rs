//! Error taxonomy for the orchestration engine.
//!
//! Every variant except [`EngineError::Setup`] is recovered at the loop
//! boundary of the [`ExecutionCoordinator`](crate::agent::coordinator::ExecutionCoordinator)
//! and turned into a conversational message or a logged warning. A user
//! declining a command is not an error; see
//! [`GateOutcome::Declined`](crate::gate::GateOutcome::Declined).

use thiserror::Error;

/// Failure of a round-trip to the AI backend.
///
/// `status` is the HTTP status when the backend answered with a non-2xx
/// response, and `None` for transport failures, timeouts, and bodies that
/// could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("AI backend error{}: {message}", status_suffix(.status))]
pub struct AiBackendError {
    pub status: Option<u16>,
    pub message: String,
}

impl AiBackendError {
    /// An error with an HTTP status code.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// A transport, timeout, or decoding failure (no status).
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Failure reported by a pane collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaneError {
    /// There is no addressable pane at all.
    #[error("no addressable pane: {0}")]
    NoTarget(String),
    /// The multiplexer ran but reported failure.
    #[error("`{command}` failed: {message}")]
    Command { command: String, message: String },
    /// The multiplexer binary could not be started.
    #[error("failed to run `{command}`: {message}")]
    Spawn { command: String, message: String },
}

/// Top-level engine error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The AI reply did not parse into structured fields.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    AiBackend(#[from] AiBackendError),
    /// A capture, key send, or command dispatch to the pane failed.
    #[error("execution dispatch failed: {0}")]
    ExecutionDispatch(#[from] PaneError),
    /// The summarization call failed or produced an unusable summary.
    #[error("squash failed: {0}")]
    SquashFailure(String),
    #[error("knowledge base `{name}` unavailable: {reason}")]
    KnowledgeUnavailable { name: String, reason: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Fatal: the session cannot start.
    #[error("session setup failed: {0}")]
    Setup(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_display_includes_status() {
        let err = AiBackendError::http(429, "rate limited");
        assert_eq!(err.to_string(), "AI backend error (HTTP 429): rate limited");

        let err = AiBackendError::transport("connection reset");
        assert_eq!(err.to_string(), "AI backend error: connection reset");
    }

    #[test]
    fn pane_error_converts_into_dispatch_error() {
        let err: EngineError = PaneError::Command {
            command: "tmux send-keys".into(),
            message: "can't find pane: %9".into(),
        }
        .into();
        assert!(matches!(err, EngineError::ExecutionDispatch(_)));
        assert!(err.to_string().contains("can't find pane"));
    }
}
