//! Session Management
//!
//! Explicit per-user session context: conversation history plus the settings
//! a turn needs. Sessions share no mutable state with each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::message::Conversation;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Settings fixed for the lifetime of a session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// System prompt inserted once at the head of the history
    pub system_prompt: String,

    /// Assistant greeting inserted right after the system prompt
    pub greeting: String,

    /// Model used for this session
    pub model: String,
}

/// Session metadata
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Session title, pinned from the first user message once a turn completes
    pub title: Option<String>,

    /// Model used for this session
    pub model: String,

    /// Completed turns
    pub turns: u32,
}

/// A complete agent session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier
    pub id: SessionId,

    /// Conversation history
    pub conversation: Conversation,

    /// Session metadata
    pub metadata: SessionMetadata,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,

    /// Whether session is active
    pub active: bool,
}

impl Session {
    /// Create an empty session
    pub fn new(model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            conversation: Conversation::new(),
            metadata: SessionMetadata {
                model: model.into(),
                ..Default::default()
            },
            created_at: now,
            updated_at: now,
            active: true,
        }
    }

    /// Create a session and insert the system prompt and greeting
    pub fn start(config: &SessionConfig) -> Self {
        let mut session = Self::new(config.model.clone());
        session
            .conversation
            .ensure_bootstrap(&config.system_prompt, &config.greeting);
        tracing::debug!(session_id = %session.id, model = %config.model, "session started");
        session
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Fail unless the session can take another turn
    pub fn ensure_active(&self) -> Result<()> {
        if self.active {
            Ok(())
        } else {
            Err(AgentError::Session(format!("session {} has ended", self.id)))
        }
    }

    /// Record a finished turn
    pub fn record_turn(&mut self) {
        self.metadata.turns += 1;
        if self.metadata.title.is_none() {
            self.metadata.title = Some(self.title());
        }
        self.touch();
    }

    /// Stored title, or one derived from the first user message
    pub fn title(&self) -> String {
        self.metadata.title.clone().unwrap_or_else(|| {
            self.conversation
                .messages()
                .iter()
                .find(|m| m.role == crate::message::Role::User)
                .map(|m| {
                    let preview: String = m.text().chars().take(50).collect();
                    if m.text().chars().count() > 50 {
                        format!("{preview}...")
                    } else {
                        preview
                    }
                })
                .unwrap_or_else(|| format!("Session {}", &self.id.0[..8.min(self.id.0.len())]))
        })
    }

    /// End the session
    pub fn end(&mut self) {
        self.active = false;
        self.touch();
        tracing::debug!(session_id = %self.id, turns = self.metadata.turns, "session ended");
    }

    /// Message count
    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }
}
