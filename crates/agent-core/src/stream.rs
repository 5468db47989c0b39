//! Streaming Assembly
//!
//! Concatenates completion deltas in order, with caller-driven cancellation.
//! Tool calls carried by the stream are kept alongside the text.

use futures::StreamExt;
use tokio::sync::watch;

use crate::error::Result;
use crate::provider::{CompletionStream, TokenUsage};
use crate::tool::ToolCall;

/// Caller side of a cancellation signal
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Stop the paired stream at the next chunk boundary
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Consumer side of a cancellation signal
#[derive(Clone, Debug)]
pub struct StreamCancel {
    rx: watch::Receiver<bool>,
}

impl StreamCancel {
    /// Create a linked handle/signal pair
    pub fn pair() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Self { rx })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled; pends forever if the handle is dropped uncancelled
    pub(crate) async fn cancelled(&mut self) {
        if self.rx.wait_for(|c| *c).await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}

/// Text assembled from a stream
#[derive(Clone, Debug, Default)]
pub struct StreamedText {
    pub text: String,
    pub cancelled: bool,
    pub usage: Option<TokenUsage>,

    /// Tools requested on the stream, in order
    pub tool_calls: Vec<ToolCall>,
}

impl StreamedText {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Drain `stream`, forwarding each delta to `on_delta`.
///
/// On cancellation the text received so far is returned untouched. A stream
/// error aborts assembly and is propagated.
pub async fn collect_stream<F>(
    mut stream: CompletionStream,
    mut cancel: Option<StreamCancel>,
    mut on_delta: F,
) -> Result<StreamedText>
where
    F: FnMut(&str) + Send,
{
    let mut assembled = StreamedText::default();

    loop {
        if cancel.as_ref().is_some_and(StreamCancel::is_cancelled) {
            assembled.cancelled = true;
            break;
        }

        let next = match cancel.as_mut() {
            Some(signal) => tokio::select! {
                biased;
                () = signal.cancelled() => {
                    assembled.cancelled = true;
                    break;
                }
                item = stream.next() => item,
            },
            None => stream.next().await,
        };

        let Some(chunk) = next else { break };
        let chunk = chunk?;

        if !chunk.delta.is_empty() {
            on_delta(&chunk.delta);
            assembled.text.push_str(&chunk.delta);
        }
        if chunk.usage.is_some() {
            assembled.usage = chunk.usage;
        }
        assembled.tool_calls.extend(chunk.tool_calls);
        if chunk.done {
            break;
        }
    }

    if assembled.cancelled {
        tracing::debug!(chars = assembled.text.len(), "stream cancelled by caller");
    }

    Ok(assembled)
}
