//! Error types and reporting for pipeline nodes.

use std::fmt;

/// Errors that can occur while a node processes a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The unit was lost but the pipeline can keep going.
    Recoverable(String),
    /// The pipeline cannot continue; usually a construction bug or a closed sink.
    Fatal(String),
}

impl NodeError {
    /// Returns true for errors that must stop the current turn.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NodeError::Fatal(_))
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            NodeError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for NodeError {}

/// Trait for reporting node errors.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error raised by the named node.
    fn report(&self, node: &str, error: &NodeError);
}

/// Error reporter that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, node: &str, error: &NodeError) {
        match error {
            NodeError::Recoverable(_) => tracing::warn!(node, %error, "pipeline node failed"),
            NodeError::Fatal(_) => tracing::error!(node, %error, "pipeline node failed"),
        }
    }
}
