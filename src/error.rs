//! Orchestrator error types

use thiserror::Error;

use crate::types::AgentId;

/// Errors that can occur in the orchestrator
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Agent not registered
    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    /// Agent invocation failed
    #[error("Agent {agent} failed: {message}")]
    AgentInvocation { agent: AgentId, message: String },

    /// Cascade was cancelled by the caller
    #[error("Cascade cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistence sink error
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
