//! Read-eval-print loop
//!
//! One line in, one turn out. Ctrl-C during a turn interrupts it: a streamed
//! answer keeps what already arrived, anything else is dropped from the
//! history. Ctrl-C at the prompt exits.

use std::io::Write;

use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};

use agent_core::{AgentError, Message, Role, StreamCancel, ToolKind, TurnOutcome};
use variant_advisor::VariantTool;

use crate::state::ChatState;

/// A line typed at the prompt
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    Reset,
    History,
    Tools,
    Help,
    Unknown(&'a str),
    Ask(&'a str),
    Empty,
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        match line {
            "" => Self::Empty,
            "/quit" | "/exit" => Self::Quit,
            "/reset" => Self::Reset,
            "/history" => Self::History,
            "/tools" => Self::Tools,
            "/help" => Self::Help,
            other if other.starts_with('/') => Self::Unknown(other),
            question => Self::Ask(question),
        }
    }
}

pub async fn run(state: &mut ChatState) -> anyhow::Result<()> {
    print_history(state);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match Command::parse(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Reset => {
                state.reset();
                println!("{}", style("Started a new conversation.").dim());
                print_history(state);
            }
            Command::History => print_history(state),
            Command::Tools => print_tools(),
            Command::Help => print_help(),
            Command::Unknown(cmd) => println!("{} {cmd} (try /help)", style("Unknown command:").yellow()),
            Command::Ask(question) => ask(state, question).await?,
        }
    }

    state.session.end();
    tracing::info!(session_id = %state.session.id, "session ended");
    Ok(())
}

async fn ask(state: &mut ChatState, question: &str) -> anyhow::Result<()> {
    print!("{} ", style("assistant>").cyan().bold());
    std::io::stdout().flush()?;

    let ChatState { agent, session, stream, .. } = state;
    let (handle, cancel) = StreamCancel::pair();
    let turn = async {
        if *stream {
            agent
                .run_turn_streaming(session, question, Some(cancel), |delta| {
                    render_delta(&mut std::io::stdout(), delta);
                })
                .await
        } else {
            let result = agent.run_turn_cancellable(session, question, cancel).await;
            if let Ok(outcome) = &result {
                print!("{}", outcome.answer);
            }
            result
        }
    };
    tokio::pin!(turn);

    let result = loop {
        tokio::select! {
            result = &mut turn => break result,
            _ = tokio::signal::ctrl_c() => handle.cancel(),
        }
    };
    println!();

    match result {
        Ok(outcome) => print_outcome(&outcome),
        Err(AgentError::Cancelled) => println!("{}", style("(interrupted)").yellow()),
        Err(e) => {
            tracing::error!(error = %e, "turn failed");
            eprintln!("{}", style(e.user_message()).red());
            if e.is_retryable() {
                println!("{}", style("This may be temporary; ask again in a moment.").dim());
            }
        }
    }
    Ok(())
}

/// Print one streamed delta, logging rather than failing on write errors
fn render_delta(out: &mut impl Write, delta: &str) {
    if let Err(e) = out.write_all(delta.as_bytes()).and_then(|()| out.flush()) {
        tracing::debug!(error = %e, "stdout write failed");
    }
}

fn prompt() -> std::io::Result<()> {
    print!("{} ", style("you>").green().bold());
    std::io::stdout().flush()
}

fn print_outcome(outcome: &TurnOutcome) {
    for invocation in &outcome.invocations {
        let status = if invocation.result.ok {
            style("ok").green()
        } else {
            style("failed").red()
        };
        println!("  {} {} {status}", style("↳").dim(), style(&invocation.call.name).dim());
    }
    if outcome.cancelled {
        println!("{}", style("(interrupted)").yellow());
    }
}

fn print_history(state: &ChatState) {
    if state.session.metadata.turns > 0 {
        println!("{}", style(state.session.title()).bold().underlined());
    }
    for message in state.session.conversation.visible_messages() {
        print_message(message);
    }
}

fn print_message(message: &Message) {
    match message.role {
        Role::User => println!("{} {}", style("you>").green().bold(), message.text()),
        Role::Assistant if message.has_tool_calls() => {
            for call in &message.tool_calls {
                println!("  {} {}({})", style("↳").dim(), call.name, call.raw_arguments);
            }
        }
        Role::Assistant => println!("{} {}", style("assistant>").cyan().bold(), message.text()),
        Role::Tool => {}
        Role::System => println!("{}", style(message.text()).dim()),
    }
}

fn print_tools() {
    for tool in VariantTool::all() {
        let spec = tool.spec();
        let params: Vec<&str> = spec.parameters.iter().map(|p| p.name.as_str()).collect();
        println!("{}({})", style(&spec.name).bold(), params.join(", "));
        println!("    {}", spec.description);
    }
}

fn print_help() {
    println!("/tools    list the lookups the assistant can run");
    println!("/history  show this conversation");
    println!("/reset    start a new conversation");
    println!("/quit     leave");
    println!("Ctrl-C interrupts the current answer; at the prompt it exits.");
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts writes, refuses to flush
    struct ClosedTerminal(Vec<u8>);

    impl Write for ClosedTerminal {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "terminal closed"))
        }
    }

    #[test]
    fn test_render_delta_survives_flush_failure() {
        let mut out = ClosedTerminal(Vec::new());
        render_delta(&mut out, "Path");
        render_delta(&mut out, "ogenic");
        assert_eq!(out.0, b"Pathogenic");

        let mut buffer = Vec::new();
        render_delta(&mut buffer, "ok");
        assert_eq!(buffer, b"ok");
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("  /quit "), Command::Quit);
        assert_eq!(Command::parse("/exit"), Command::Quit);
        assert_eq!(Command::parse("/reset"), Command::Reset);
        assert_eq!(Command::parse("/history"), Command::History);
        assert_eq!(Command::parse("/tools"), Command::Tools);
        assert_eq!(Command::parse("   "), Command::Empty);
        assert_eq!(Command::parse("/nope"), Command::Unknown("/nope"));
        assert_eq!(
            Command::parse("What is RCV000009910?"),
            Command::Ask("What is RCV000009910?")
        );
    }
}
