//! # agent-core
//!
//! Tool-calling orchestration with a provider-agnostic LLM abstraction.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Agent                               │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────┐  │
//! │  │ Orchestration│  │ ToolRegistry │  │   LlmProvider     │  │
//! │  │     Loop     │──│ (closed enum)│──│   (Strategy)      │  │
//! │  └──────────────┘  └──────────────┘  └───────────────────┘  │
//! │          │                                                   │
//! │  ┌──────────────┐                                            │
//! │  │   Session    │  conversation history, one per user        │
//! │  └──────────────┘                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait keeps the loop independent of the chat backend;
//! the `Toolbox` trait keeps it independent of the domain tools.

pub mod error;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod session;
pub mod stream;
pub mod tool;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use orchestrator::{Agent, AgentBuilder, AgentConfig, LoopState, ToolInvocation, TurnOutcome};
pub use provider::{ChatRequest, Completion, GenerationOptions, LlmProvider, ToolChoice};
pub use session::{Session, SessionConfig, SessionId};
pub use stream::{CancelHandle, StreamCancel};
pub use tool::{
    LookupResult, ParameterSchema, ToolArguments, ToolCall, ToolKind, ToolRegistry, ToolSpec, Toolbox,
};
