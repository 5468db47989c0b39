//! # agent-runtime
//!
//! Runtime providers for the variant assistant.
//!
//! ## Providers
//!
//! - **Mistral**: hosted chat completions with function calling
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{MistralConfig, MistralProvider};
//!
//! let provider = MistralProvider::from_config(MistralConfig::from_env()?)?;
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .tools(registry)
//!     .build()?;
//! ```

pub mod mistral;

pub use mistral::{MistralConfig, MistralProvider, API_KEY_ENV};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentError, LlmProvider, Message, Result, Role, Session, ToolRegistry, Toolbox,
};
