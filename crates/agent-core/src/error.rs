//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// No API credential configured for the provider
    #[error("Credential missing: {0}")]
    CredentialMissing(String),

    /// Model requested a tool that is not in the registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool-call arguments were not a JSON object
    #[error("Malformed arguments for tool '{tool}': {reason}")]
    MalformedToolArguments { tool: String, reason: String },

    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Session error
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Turn interrupted by the caller before any answer text arrived
    #[error("Cancelled")]
    Cancelled,

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_) | Self::RateLimited(_) | Self::Io(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::ProviderUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            Self::CredentialMissing(what) => format!("No API key configured ({what}). Please provide one to continue."),
            Self::UnknownTool(name) => format!("The tool '{name}' is not available."),
            Self::MalformedToolArguments { tool, .. } => format!("The request to '{tool}' had unreadable arguments."),
            Self::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            Self::Session(msg) => format!("Session problem: {msg}"),
            Self::RateLimited(_) => "You've made too many requests. Please wait a moment.".into(),
            Self::Auth(_) => "Authentication failed. Please check your API key.".into(),
            Self::Cancelled => "The response was interrupted.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
