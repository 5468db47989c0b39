//! Conversation Messages
//!
//! Role-tagged message history with the one-time system/greeting bootstrap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::ToolCall;

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content; assistant tool-call messages may carry none
    pub content: Option<String>,

    /// Tool invocations requested by the model (assistant messages only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Name of the tool that produced this message (tool messages only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Provider correlation id of the call this message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new text message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_name: None,
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create the assistant message that records a tool request
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.filter(|c| !c.is_empty()),
            tool_calls,
            tool_name: None,
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a tool result message
    pub fn tool(
        tool_name: impl Into<String>,
        tool_call_id: Option<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_name: Some(tool_name.into()),
            tool_call_id,
            timestamp: Utc::now(),
        }
    }

    /// Text content, empty when absent
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// Whether the message carries tool requests
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Ordered conversation history
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message; no role sequencing is enforced
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Insert the system prompt at 0 and the greeting at 1, once per conversation.
    ///
    /// Nothing happens if a system message already exists or the prompt is
    /// blank. Returns whether the bootstrap pair was inserted.
    pub fn ensure_bootstrap(&mut self, system_prompt: &str, greeting: &str) -> bool {
        if system_prompt.trim().is_empty() || self.has_system_message() {
            return false;
        }

        self.messages.insert(0, Message::system(system_prompt));
        self.messages.insert(1, Message::assistant(greeting));
        true
    }

    /// Whether any system-role message is present
    pub fn has_system_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::System)
    }

    /// Every message except system ones, in order.
    ///
    /// Recomputed from the full history on each call, so it can be replayed
    /// any number of times.
    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> + '_ {
        self.messages.iter().filter(|m| m.role != Role::System)
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Drop every message from index `len` on
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
