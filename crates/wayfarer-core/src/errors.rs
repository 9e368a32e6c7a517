//! Error types shared across the travel assistant.
//!
//! Errors are grouped by where they come from (model, tools, Amadeus,
//! configuration) so the chat loop can decide whether to surface them to the
//! model as a tool result or to the client as a failed turn.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AgentError {
    #[error("LLM interaction failed: {0}")]
    LLMError(String),
    #[error("Tool execution failed for '{tool_name}': {message}")]
    ToolError { tool_name: String, message: String },
    #[error("Amadeus API error{}: {message}", status_suffix(.status))]
    AmadeusError { status: Option<u16>, message: String },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Parsing error: {0}")]
    ParsingError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("I/O error: {0}")]
    IoError(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl AgentError {
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::ToolError {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    pub fn amadeus(status: Option<u16>, message: impl Into<String>) -> Self {
        AgentError::AmadeusError {
            status,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::AmadeusError {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
