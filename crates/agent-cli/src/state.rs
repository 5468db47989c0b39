//! Chat State

use agent_core::{Agent, Session, SessionConfig};
use variant_advisor::VariantToolbox;

/// Everything one terminal chat needs
pub struct ChatState {
    /// Orchestration loop with the variant tools
    pub agent: Agent<VariantToolbox>,

    /// Current conversation
    pub session: Session,

    /// Settings used to start each session
    pub config: SessionConfig,

    /// Whether answers are streamed
    pub stream: bool,
}

impl ChatState {
    pub fn new(agent: Agent<VariantToolbox>, config: SessionConfig, stream: bool) -> Self {
        let session = Session::start(&config);
        tracing::info!(session_id = %session.id, model = %config.model, "session started");
        Self {
            agent,
            session,
            config,
            stream,
        }
    }

    /// End the current session and start a fresh one
    pub fn reset(&mut self) {
        self.session.end();
        tracing::info!(
            session_id = %self.session.id,
            title = %self.session.title(),
            turns = self.session.metadata.turns,
            messages = self.session.message_count(),
            "session ended"
        );
        self.session = Session::start(&self.config);
    }
}
