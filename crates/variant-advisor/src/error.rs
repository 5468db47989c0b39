//! Error Types for Variant Advisor

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("upstream returned HTTP {status}: API request failed")]
    Transport { status: u16, url: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed XML record: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Unexpected response from {source_name}: {reason}")]
    InvalidResponse { source_name: &'static str, reason: String },

    #[error("Required field missing: {0}")]
    MissingRequiredField(&'static str),
}

impl AdvisorError {
    pub fn invalid(source_name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            source_name,
            reason: reason.into(),
        }
    }

    /// HTTP status of a transport failure
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}
