//! Core error types for the action pipeline and the iterator trigger.
//!
//! `ActionError` covers everything that can go wrong between raw model text
//! and a validated payload. `TriggerError` covers the concurrent driver.
//! Domain-level failures an action can recover from are *not* errors: they
//! are reported as an `ActionOutput` with `success = false`.

use std::time::Duration;

/// Failure type produced by external collaborators (terminal computations,
/// input sources). Opaque to this crate.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The declared payload type is neither a structured type nor a list of one.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Model text contained no parseable structured object.
    #[error("No structured output found in model reply")]
    NoStructuredOutput,

    /// An extracted object does not satisfy the declared payload type.
    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Node '{node_id}' timed out after {timeout:?}")]
    Timeout { node_id: String, timeout: Duration },

    #[error("Node '{node_id}' failed: {source}")]
    Node {
        node_id: String,
        #[source]
        source: BoxError,
    },

    #[error("Node '{node_id}' failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        node_id: String,
        attempts: u32,
        #[source]
        source: Box<TriggerError>,
    },

    #[error("Failed to read input source: {0}")]
    Input(#[source] BoxError),

    #[error("Trigger task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl TriggerError {
    /// Number of attempts recorded by a `RetriesExhausted` error.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            TriggerError::RetriesExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}
