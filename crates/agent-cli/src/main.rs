//! variant-chat
//!
//! Terminal assistant for genetic variant analysis. Answers questions by
//! calling gnomAD, Ensembl VEP, MutationTaster, ClinVar, dbSNP and dbVar
//! through a Mistral model.

mod repl;
mod state;

use std::sync::Arc;

use clap::Parser;
use clap::builder::PossibleValuesParser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{AgentBuilder, AgentError, LlmProvider};
use agent_runtime::{MistralConfig, MistralProvider};
use variant_advisor::{DEFAULT_MODEL, Endpoints, MODEL_OPTIONS, ReqwestTransport, session_config, tool_registry};

use crate::state::ChatState;

#[derive(Parser, Debug)]
#[command(name = "variant-chat", version, about = "Chat with an assistant for genetic variant analysis")]
struct Cli {
    /// Chat model
    #[arg(long, default_value = DEFAULT_MODEL, value_parser = PossibleValuesParser::new(MODEL_OPTIONS))]
    model: String,

    /// Print each answer only once it is complete
    #[arg(long)]
    no_stream: bool,

    /// Replace the built-in system prompt
    #[arg(long, value_name = "TEXT")]
    system_prompt: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn,variant_chat=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let provider = Arc::new(MistralProvider::from_config(resolve_credentials()?)?);
    match provider.health_check().await {
        Ok(true) => tracing::info!(provider = provider.name(), "provider reachable"),
        Ok(false) | Err(_) => tracing::warn!(provider = provider.name(), "provider not reachable, turns may fail"),
    }

    let transport = Arc::new(ReqwestTransport::new()?);
    let registry = tool_registry(transport, &Endpoints::from_env());

    let agent = AgentBuilder::new()
        .provider(provider)
        .tools(registry)
        .model(&cli.model)
        .build()?;

    let mut config = session_config(&cli.model);
    if let Some(prompt) = cli.system_prompt {
        config.system_prompt = prompt;
    }

    let mut state = ChatState::new(agent, config, !cli.no_stream);
    repl::run(&mut state).await
}

/// API key from the environment, or asked for once on the terminal
fn resolve_credentials() -> anyhow::Result<MistralConfig> {
    match MistralConfig::from_env() {
        Ok(config) => Ok(config),
        Err(AgentError::CredentialMissing(var)) => {
            let term = console::Term::stderr();
            term.write_str(&format!("{var} is not set. Mistral API key: "))?;
            let key = term.read_secure_line()?;
            let key = key.trim();
            if key.is_empty() {
                anyhow::bail!("no Mistral API key provided");
            }
            Ok(MistralConfig::with_api_key(key).with_env_overrides())
        }
        Err(e) => Err(e.into()),
    }
}
