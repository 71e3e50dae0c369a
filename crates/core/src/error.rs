//! Error types for the Loopwright domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use crate::state::AgentState;
use thiserror::Error;

/// The top-level error type for all Loopwright operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Lifecycle errors (fatal for the call that raised them) ---
    #[error("Cannot run agent from state: {0}")]
    InvalidState(AgentState),

    #[error("Unsupported message role: {0}")]
    InvalidRole(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    // --- Step errors ---
    #[error("Step failed: {0}")]
    Step(String),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Notification errors ---
    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Cannot combine tool results: both sides set '{0}'")]
    AmbiguousMerge(&'static str),
}

#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("Observer failed: {0}")]
    ObserverFailed(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
