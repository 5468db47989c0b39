//! Orchestration Loop
//!
//! One user turn: model call → optional tool round → final answer.
//!
//! ```text
//! AwaitingUserInput ─▶ ModelCallPending(auto) ─┬─▶ DirectAnswer ─▶ AwaitingUserInput
//!                                              └─▶ ToolsRequested ─▶ ExecutingTools
//!                                                   ─▶ ModelCallPending(none) ─▶ DirectAnswer
//! ```
//!
//! Tool calls run strictly one after another in the order the model listed
//! them, and every call leaves exactly one tool-role message behind, whether
//! it succeeded or not. A cancelled turn that produced no answer text leaves
//! the history as it found it.

use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{ChatRequest, Completion, GenerationOptions, LlmProvider, TokenUsage, ToolChoice};
use crate::session::Session;
use crate::stream::{StreamCancel, StreamedText, collect_stream};
use crate::tool::{LookupResult, ToolCall, ToolRegistry, Toolbox};

/// States of a single turn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    AwaitingUserInput,
    ModelCallPending { tool_choice: ToolChoice },
    ToolsRequested { count: usize },
    ExecutingTools,
    DirectAnswer,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingUserInput => write!(f, "awaiting_user_input"),
            Self::ModelCallPending { tool_choice } => write!(f, "model_call_pending(tools={tool_choice})"),
            Self::ToolsRequested { count } => write!(f, "tools_requested({count})"),
            Self::ExecutingTools => write!(f, "executing_tools"),
            Self::DirectAnswer => write!(f, "direct_answer"),
        }
    }
}

/// One executed tool call
#[derive(Clone, Debug)]
pub struct ToolInvocation {
    pub call: ToolCall,
    pub result: LookupResult,
}

/// Everything a finished turn produced
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    /// Final assistant text surfaced to the caller
    pub answer: String,

    /// Tool calls executed during the turn, in request order
    pub invocations: Vec<ToolInvocation>,

    /// States visited, in order
    pub states: Vec<LoopState>,

    /// Whether the final stream was cancelled by the caller
    pub cancelled: bool,

    /// Accumulated token usage across model calls
    pub usage: TokenUsage,
}

impl TurnOutcome {
    fn new() -> Self {
        Self {
            answer: String::new(),
            invocations: Vec::new(),
            states: vec![LoopState::AwaitingUserInput],
            cancelled: false,
            usage: TokenUsage::default(),
        }
    }

    fn enter(&mut self, state: LoopState) {
        tracing::debug!(%state, "turn state");
        self.states.push(state);
    }

    fn absorb(&mut self, usage: Option<&TokenUsage>) {
        if let Some(usage) = usage {
            self.usage.add(usage);
        }
    }
}

/// Agent configuration
#[derive(Clone, Debug, Default)]
pub struct AgentConfig {
    /// Generation options
    pub generation: GenerationOptions,
}

/// The tool-calling agent
pub struct Agent<T: Toolbox> {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry<T>>,
    config: AgentConfig,
    catalogue: Vec<serde_json::Value>,
}

impl<T: Toolbox> Agent<T> {
    /// Create a new agent
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry<T>>, config: AgentConfig) -> Self {
        let catalogue = tools.catalogue();
        Self {
            provider,
            tools,
            config,
            catalogue,
        }
    }

    /// Generation options for a session: the session's model wins
    fn options_for(&self, session: &Session) -> GenerationOptions {
        let mut options = self.config.generation.clone();
        if !session.metadata.model.is_empty() {
            options.model.clone_from(&session.metadata.model);
        }
        options
    }

    fn request<'a>(
        &'a self,
        session: &'a Session,
        options: &'a GenerationOptions,
        tool_choice: ToolChoice,
    ) -> ChatRequest<'a> {
        let request = ChatRequest {
            messages: session.conversation.messages(),
            tools: &self.catalogue,
            tool_choice,
            options,
        };
        tracing::debug!(
            session_id = %session.id,
            messages = request.messages.len(),
            %tool_choice,
            "calling model"
        );
        request
    }

    async fn call_model(
        &self,
        session: &Session,
        options: &GenerationOptions,
        tool_choice: ToolChoice,
    ) -> Result<Completion> {
        self.provider.complete(&self.request(session, options, tool_choice)).await
    }

    async fn stream_model<F>(
        &self,
        session: &Session,
        options: &GenerationOptions,
        tool_choice: ToolChoice,
        cancel: Option<StreamCancel>,
        on_delta: &mut F,
    ) -> Result<StreamedText>
    where
        F: FnMut(&str) + Send,
    {
        let stream = self
            .provider
            .complete_stream(&self.request(session, options, tool_choice))
            .await?;
        collect_stream(stream, cancel, on_delta).await
    }

    /// Open a turn: check the session and record the user message
    fn begin_turn(
        &self,
        session: &mut Session,
        user_input: &str,
        outcome: &mut TurnOutcome,
    ) -> Result<GenerationOptions> {
        session.ensure_active()?;
        session.conversation.append(Message::user(user_input));
        tracing::info!(session_id = %session.id, "turn started");

        outcome.enter(LoopState::ModelCallPending { tool_choice: ToolChoice::Auto });
        Ok(self.options_for(session))
    }

    /// Record the tool request, then run each call in order
    async fn run_tools(
        &self,
        session: &mut Session,
        content: Option<String>,
        mut calls: Vec<ToolCall>,
        outcome: &mut TurnOutcome,
    ) {
        for call in &mut calls {
            call.ensure_id();
        }

        outcome.enter(LoopState::ToolsRequested { count: calls.len() });
        session
            .conversation
            .append(Message::assistant_tool_calls(content, calls.clone()));

        outcome.enter(LoopState::ExecutingTools);
        for call in calls {
            tracing::info!(tool = %call.name, "executing tool");
            let result = self.tools.execute(&call).await;
            if !result.ok {
                tracing::warn!(tool = %call.name, error = ?result.error, "tool returned failure");
            }

            session.conversation.append(Message::tool(
                call.name.clone(),
                call.id.clone(),
                result.to_message_content(),
            ));
            outcome.invocations.push(ToolInvocation { call, result });
        }

        outcome.enter(LoopState::ModelCallPending { tool_choice: ToolChoice::None });
    }

    fn finish(&self, session: &mut Session, answer: String, outcome: &mut TurnOutcome) {
        outcome.enter(LoopState::DirectAnswer);
        session.conversation.append(Message::assistant(answer.clone()));
        session.record_turn();
        outcome.answer = answer;
        outcome.enter(LoopState::AwaitingUserInput);
        tracing::info!(
            session_id = %session.id,
            tools = outcome.invocations.len(),
            cancelled = outcome.cancelled,
            "turn finished"
        );
    }

    /// Run one user turn to completion
    pub async fn run_turn(&self, session: &mut Session, user_input: &str) -> Result<TurnOutcome> {
        let mut outcome = TurnOutcome::new();
        let options = self.begin_turn(session, user_input, &mut outcome)?;
        let completion = self.call_model(session, &options, ToolChoice::Auto).await?;
        outcome.absorb(completion.usage.as_ref());

        let final_completion = if completion.has_tool_calls() {
            self.run_tools(session, completion.content, completion.tool_calls, &mut outcome)
                .await;

            let answer = self.call_model(session, &options, ToolChoice::None).await?;
            outcome.absorb(answer.usage.as_ref());
            ignore_late_tool_calls(answer.tool_calls.len());
            answer
        } else {
            completion
        };

        self.finish(session, final_completion.content.unwrap_or_default(), &mut outcome);
        Ok(outcome)
    }

    /// Run one user turn, abandoning it when `cancel` fires.
    ///
    /// An abandoned turn leaves the history exactly as it was before the
    /// user message and fails with `AgentError::Cancelled`.
    pub async fn run_turn_cancellable(
        &self,
        session: &mut Session,
        user_input: &str,
        mut cancel: StreamCancel,
    ) -> Result<TurnOutcome> {
        let mark = session.conversation.len();
        let finished = {
            let turn = self.run_turn(session, user_input);
            tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                result = turn => Some(result),
            }
        };

        match finished {
            Some(result) => result,
            None => Err(abandon(session, mark)),
        }
    }

    /// Run one user turn, delivering the answer text incrementally.
    ///
    /// Both model calls are streamed. Text deltas of the tools-enabled call
    /// reach `on_delta` as they arrive; if that stream ends with tool calls,
    /// they run and the tools-disabled answer is streamed the same way.
    /// Cancelling keeps the text received so far as the assistant message.
    /// A turn cancelled before any text arrived is rolled back and fails
    /// with `AgentError::Cancelled`.
    pub async fn run_turn_streaming<F>(
        &self,
        session: &mut Session,
        user_input: &str,
        cancel: Option<StreamCancel>,
        mut on_delta: F,
    ) -> Result<TurnOutcome>
    where
        F: FnMut(&str) + Send,
    {
        let mark = session.conversation.len();
        let mut outcome = TurnOutcome::new();
        let options = self.begin_turn(session, user_input, &mut outcome)?;

        let first = self
            .stream_model(session, &options, ToolChoice::Auto, cancel.clone(), &mut on_delta)
            .await?;
        outcome.absorb(first.usage.as_ref());

        let streamed = if first.has_tool_calls() && !first.cancelled {
            let content = Some(first.text).filter(|text| !text.is_empty());
            self.run_tools(session, content, first.tool_calls, &mut outcome).await;

            let answer = self
                .stream_model(session, &options, ToolChoice::None, cancel, &mut on_delta)
                .await?;
            outcome.absorb(answer.usage.as_ref());
            ignore_late_tool_calls(answer.tool_calls.len());
            answer
        } else {
            first
        };

        if streamed.cancelled && streamed.text.is_empty() {
            return Err(abandon(session, mark));
        }

        outcome.cancelled = streamed.cancelled;
        self.finish(session, streamed.text, &mut outcome);
        Ok(outcome)
    }
}

fn ignore_late_tool_calls(count: usize) {
    if count > 0 {
        tracing::warn!(count, "model requested tools with tool use disabled; ignoring");
    }
}

/// Undo a turn that produced no answer
fn abandon(session: &mut Session, mark: usize) -> AgentError {
    session.conversation.truncate(mark);
    tracing::info!(session_id = %session.id, "turn cancelled; history rolled back");
    AgentError::Cancelled
}

/// Builder for Agent configuration
pub struct AgentBuilder<T: Toolbox> {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: Option<Arc<ToolRegistry<T>>>,
    config: AgentConfig,
}

impl<T: Toolbox> Default for AgentBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Toolbox> AgentBuilder<T> {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: None,
            config: AgentConfig::default(),
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry<T>) -> Self {
        self.tools = Some(Arc::new(tools));
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn build(self) -> Result<Agent<T>> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;
        let tools = self
            .tools
            .ok_or_else(|| AgentError::Config("Tool registry is required".into()))?;

        Ok(Agent::new(provider, tools, self.config))
    }
}
