//! Error types for debate-forge operations.
//!
//! Defines error types for the major subsystems:
//! - Run configuration and validation
//! - Agent capability calls
//! - Tool routing
//! - LLM backend transport

use thiserror::Error;

/// Errors detected before a debate run starts.
///
/// These are fatal: a run never begins in an inconsistent configuration,
/// so no partial transcript is produced for them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Debate topic must not be empty")]
    EmptyTopic,

    #[error("At least one agent must be configured")]
    NoAgents,

    #[error("Agent name must not be empty")]
    EmptyAgentName,

    #[error("Duplicate agent name: '{0}'")]
    DuplicateAgentName(String),

    #[error("Invalid agent spec '{0}': expected NAME or NAME=MODEL")]
    InvalidAgentSpec(String),

    #[error("Missing API key: set --api-key or the DEBATE_API_KEY environment variable")]
    MissingApiKey,
}

/// Errors that can occur during an individual agent capability call.
///
/// The phase executor converts these into transcript messages with
/// `status = "error"`; they never abort a phase.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Error from the LLM backend.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Error from the tool router.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Agent produced a response the caller could not use.
    #[error("Failed to parse agent response: {0}")]
    ResponseParse(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<LlmError> for AgentError {
    fn from(err: LlmError) -> Self {
        AgentError::Llm(err.to_string())
    }
}

impl From<ToolError> for AgentError {
    fn from(err: ToolError) -> Self {
        AgentError::Tool(err.to_string())
    }
}

/// Errors that can occur during tool routing.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool '{key}'. Known tools: {known:?}")]
    UnknownTool { key: String, known: Vec<String> },

    #[error("Tool router failed to start: {0}")]
    StartupFailed(String),

    #[error("Tool router failed to stop: {0}")]
    ShutdownFailed(String),

    #[error("Tool call '{key}' failed: {reason}")]
    CallFailed { key: String, reason: String },
}

/// Errors that can occur during LLM backend operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Empty response from model '{0}'")]
    EmptyResponse(String),
}

/// Top-level error for the orchestration layer.
#[derive(Debug, Error)]
pub enum DebateError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Debate run already finished")]
    RunFinished,
}

/// Result type alias for agent capability calls.
pub type AgentResult<T> = Result<T, AgentError>;
