//! Error types for the agent crate.

use thiserror::Error;

/// Errors that can occur while answering a user.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Tool execution failed.
    #[error("tool execution failed: {tool_name}: {message}")]
    ToolExecution {
        /// Name of the tool that failed.
        tool_name: String,
        /// Error message.
        message: String,
    },

    /// Tool not found.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Invalid tool arguments.
    #[error("invalid tool arguments for {tool_name}: {message}")]
    InvalidArguments {
        /// Name of the tool.
        tool_name: String,
        /// Error message.
        message: String,
    },

    /// Model invocation failed.
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),

    /// Response parsing failed.
    #[error("failed to parse response: {0}")]
    ResponseParse(String),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Persistence(#[from] plantmama_persistence::PersistenceError),

    /// Image could not be processed.
    #[error(transparent)]
    Image(#[from] plantmama_core::ImageError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Maximum iterations exceeded in tool loop.
    #[error("maximum iterations ({0}) exceeded in tool execution loop")]
    MaxIterationsExceeded(u32),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AgentError {
    /// Shorthand for a tool failure.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Shorthand for bad tool arguments.
    pub fn invalid_args(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
