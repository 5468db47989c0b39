//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for chat-completion backends that support
//! function calling. A provider answers with either text or an ordered list
//! of tool calls.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{ChatRequest, LlmProvider, ToolChoice};
//!
//! let request = ChatRequest {
//!     messages: conversation.messages(),
//!     tools: &catalogue,
//!     tool_choice: ToolChoice::Auto,
//!     options: &options,
//! };
//! let completion = provider.complete(&request).await?;
//! ```

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

use crate::error::Result;
use crate::message::Message;
use crate::tool::ToolCall;

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "mistral-large-latest")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

const fn default_temperature() -> f32 { 0.3 }
const fn default_max_tokens() -> u32 { 2048 }
const fn default_top_p() -> f32 { 1.0 }

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "mistral-large-latest".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
        }
    }
}

/// Whether the model may request tools on this call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// Model decides between answering and calling tools
    Auto,
    /// Model must answer in text
    None,
}

impl std::fmt::Display for ToolChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::None => write!(f, "none"),
        }
    }
}

/// One call to the model
#[derive(Clone, Copy, Debug)]
pub struct ChatRequest<'a> {
    /// Full history, system message included
    pub messages: &'a [Message],

    /// Function definitions (see `ToolSpec::to_function_definition`)
    pub tools: &'a [Value],

    /// Tool selection mode
    pub tool_choice: ToolChoice,

    /// Generation options
    pub options: &'a GenerationOptions,
}

/// Response from an LLM completion
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: Option<String>,

    /// Tools the model wants run, in order
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// A plain text answer
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            finish_reason: Some(FinishReason::Stop),
            ..Default::default()
        }
    }

    /// A tool request
    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            finish_reason: Some(FinishReason::ToolCalls),
            ..Default::default()
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn add(&mut self, other: &Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
}

impl FinishReason {
    /// Parse a provider finish reason string
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "length" | "model_length" => Self::Length,
            "tool_calls" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            _ => Self::Error,
        }
    }
}

/// A chunk from streaming completion
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// The text delta
    pub delta: String,

    /// Whether this is the final chunk
    pub done: bool,

    /// Token usage (typically only on final chunk)
    pub usage: Option<TokenUsage>,

    /// Complete tool calls, in order, once the provider has assembled them
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

/// Stream type for completion streaming
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "Mistral")
    fn name(&self) -> &str;

    /// Check if the provider is reachable and the credential accepted
    async fn health_check(&self) -> Result<bool>;

    /// Generate a completion, possibly a tool request
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<Completion>;

    /// Generate a streaming completion. Text arrives as deltas; a tool
    /// request arrives as whole calls, at the latest on the final chunk.
    async fn complete_stream(&self, request: &ChatRequest<'_>) -> Result<CompletionStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert_eq!(opts.max_tokens, 2048);
        assert_eq!(opts.model, "mistral-large-latest");
    }

    #[test]
    fn test_tool_choice_wire_names() {
        assert_eq!(serde_json::to_value(ToolChoice::Auto).unwrap(), "auto");
        assert_eq!(serde_json::to_value(ToolChoice::None).unwrap(), "none");
    }

    #[test]
    fn test_finish_reason_parsing() {
        assert_eq!(FinishReason::from_wire("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from_wire("model_length"), FinishReason::Length);
        assert_eq!(FinishReason::from_wire("weird"), FinishReason::Error);
    }
}
