//! Mistral LLM Provider
//!
//! Implementation of `LlmProvider` for the Mistral chat-completions API,
//! with function calling and server-sent-event streaming.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        ChatRequest, Completion, CompletionStream, FinishReason, LlmProvider, StreamChunk,
        TokenUsage, ToolChoice,
    },
    tool::ToolCall,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// Mistral provider configuration
#[derive(Clone)]
pub struct MistralConfig {
    /// API base URL
    pub base_url: String,

    /// Bearer credential
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl std::fmt::Debug for MistralConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MistralConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl MistralConfig {
    /// Configuration with the default endpoint and the given key
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.mistral.ai/v1".into(),
            api_key: api_key.into(),
            timeout_secs: 120,
        }
    }

    /// Read configuration from the environment.
    ///
    /// Fails with `CredentialMissing` when no API key is set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::CredentialMissing(API_KEY_ENV.into()))?;

        Ok(Self::with_api_key(api_key).with_env_overrides())
    }

    /// Apply `MISTRAL_BASE_URL` and `MISTRAL_TIMEOUT_SECS` when set
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(base_url) = std::env::var("MISTRAL_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(timeout) = std::env::var("MISTRAL_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
        {
            self.timeout_secs = timeout;
        }
        self
    }
}

/// Mistral LLM provider
pub struct MistralProvider {
    client: reqwest::Client,
    config: MistralConfig,
}

impl MistralProvider {
    /// Create from configuration
    pub fn from_config(config: MistralConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("variant-chat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgentError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Convert agent messages to the wire format
    fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.to_string(),
                content: m.content.clone().unwrap_or_default(),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(m.tool_calls.iter().map(WireToolCall::from_call).collect())
                },
                name: match m.role {
                    Role::Tool => m.tool_name.clone(),
                    _ => None,
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    fn build_body(request: &ChatRequest<'_>, stream: bool) -> WireRequest {
        let with_tools = !request.tools.is_empty();
        WireRequest {
            model: request.options.model.clone(),
            messages: Self::convert_messages(request.messages),
            tools: with_tools.then(|| request.tools.to_vec()),
            tool_choice: with_tools.then_some(request.tool_choice),
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
            top_p: request.options.top_p,
            stream,
        }
    }

    /// Convert a wire response to an agent completion
    fn convert_completion(response: WireResponse) -> Result<Completion> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Provider("response contained no choices".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(WireToolCall::into_call)
            .collect();

        Ok(Completion {
            content: choice.message.content.filter(|c| !c.is_empty()),
            tool_calls,
            model: response.model,
            usage: response.usage,
            finish_reason: choice.finish_reason.as_deref().map(FinishReason::from_wire),
        })
    }

    async fn post(&self, body: &WireRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response.text().await.unwrap_or_default();
        Err(status_error(status.as_u16(), &detail))
    }
}

/// Map a non-success HTTP status onto the agent error taxonomy
fn status_error(status: u16, detail: &str) -> AgentError {
    let message = format!("HTTP {status}: {}", detail.chars().take(300).collect::<String>());
    match status {
        401 | 403 => AgentError::Auth(message),
        429 => AgentError::RateLimited(message),
        500..=599 => AgentError::ProviderUnavailable(message),
        _ => AgentError::Provider(message),
    }
}

#[async_trait]
impl LlmProvider for MistralProvider {
    fn name(&self) -> &str {
        "Mistral"
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.endpoint("models"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => Ok(true),
            Ok(r) => {
                tracing::warn!(status = %r.status(), "Mistral health check rejected");
                Ok(false)
            }
            Err(e) => {
                tracing::warn!("Mistral health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<Completion> {
        let body = Self::build_body(request, false);
        tracing::debug!(model = %body.model, messages = body.messages.len(), "mistral completion");

        let response: WireResponse = self
            .post(&body)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("unreadable completion: {e}")))?;

        Self::convert_completion(response)
    }

    async fn complete_stream(&self, request: &ChatRequest<'_>) -> Result<CompletionStream> {
        let body = Self::build_body(request, true);
        tracing::debug!(model = %body.model, messages = body.messages.len(), "mistral stream");

        let response = self.post(&body).await?;
        let mut decoder = SseDecoder::default();
        let mut calls = ToolCallAssembler::default();

        let mapped = response
            .bytes_stream()
            .map(move |bytes| match bytes {
                Ok(bytes) => decoder
                    .push(&bytes)
                    .into_iter()
                    .map(|data| parse_stream_event(&data, &mut calls))
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(AgentError::Provider(e.to_string()))],
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(mapped))
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    /// A JSON string on the way out; some models return a bare object
    arguments: Value,
}

impl WireToolCall {
    fn from_call(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: function_type(),
            function: WireFunction {
                name: call.name.clone(),
                arguments: Value::String(call.raw_arguments.clone()),
            },
        }
    }

    fn into_call(self) -> ToolCall {
        let raw_arguments = match self.function.arguments {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let mut call = ToolCall::new(self.function.name, raw_arguments);
        call.id = self.id.filter(|id| id != "null");
        call.ensure_id();
        call
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: String,
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    #[serde(default)]
    choices: Vec<WireStreamChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    delta: WireDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCallDelta>>,
}

/// A streamed tool call, possibly only a piece of one
#[derive(Debug, Deserialize)]
struct WireToolCallDelta {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<WireFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct WireFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Default)]
struct PartialCall {
    index: Option<usize>,
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Joins tool-call fragments spread over several stream events.
///
/// Mistral usually sends each call whole in one delta; fragments sharing an
/// `index` (and not contradicting each other's id) are concatenated.
#[derive(Debug, Default)]
struct ToolCallAssembler {
    calls: Vec<PartialCall>,
}

impl ToolCallAssembler {
    fn push(&mut self, fragment: WireToolCallDelta) {
        let id = fragment.id.filter(|id| !id.is_empty() && id != "null");
        let existing = fragment
            .index
            .and_then(|index| self.calls.iter().rposition(|c| c.index == Some(index)));

        let position = match existing {
            Some(pos) if id.is_none() || self.calls[pos].id.is_none() || self.calls[pos].id == id => pos,
            _ => {
                self.calls.push(PartialCall {
                    index: fragment.index,
                    ..Default::default()
                });
                self.calls.len() - 1
            }
        };

        let call = &mut self.calls[position];
        if id.is_some() {
            call.id = id;
        }
        if let Some(function) = fragment.function {
            if let Some(name) = function.name {
                call.name.push_str(&name);
            }
            match function.arguments {
                Some(Value::String(piece)) => call.arguments.push_str(&piece),
                Some(Value::Null) | None => {}
                Some(other) => call.arguments.push_str(&other.to_string()),
            }
        }
    }

    /// Hand over every named call collected so far
    fn finish(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.calls)
            .into_iter()
            .filter(|c| !c.name.is_empty())
            .map(|c| {
                let mut call = ToolCall::new(c.name, c.arguments);
                call.id = c.id;
                call.ensure_id();
                call
            })
            .collect()
    }
}

/// Splits a byte stream into SSE `data:` payloads
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed bytes, returning every complete `data:` payload
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                events.push(data.trim_start().to_string());
            }
        }
        events
    }
}

/// Decode one `data:` payload. Tool calls are released with the chunk that
/// finishes the choice, or with `[DONE]`.
fn parse_stream_event(data: &str, calls: &mut ToolCallAssembler) -> Result<StreamChunk> {
    if data == "[DONE]" {
        return Ok(StreamChunk {
            done: true,
            tool_calls: calls.finish(),
            ..Default::default()
        });
    }

    let chunk: WireStreamChunk = serde_json::from_str(data)?;
    let mut delta = String::new();
    let mut done = false;
    if let Some(choice) = chunk.choices.into_iter().next() {
        delta = choice.delta.content.unwrap_or_default();
        for fragment in choice.delta.tool_calls.unwrap_or_default() {
            calls.push(fragment);
        }
        done = choice.finish_reason.is_some();
    }

    Ok(StreamChunk {
        delta,
        done,
        usage: chunk.usage,
        tool_calls: if done { calls.finish() } else { Vec::new() },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::provider::GenerationOptions;
    use serde_json::json;

    #[test]
    fn test_config_defaults() {
        let config = MistralConfig::with_api_key("secret");
        assert_eq!(config.base_url, "https://api.mistral.ai/v1");
        assert_eq!(config.timeout_secs, 120);
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn test_message_conversion() {
        let call = ToolCall::new("tool_get_clinvar_data_by_rcv_code", r#"{"rcv":"RCV000009910"}"#)
            .with_id("abc123def");
        let messages = vec![
            Message::system("You are helpful."),
            Message::user("Hello"),
            Message::assistant_tool_calls(None, vec![call]),
            Message::tool("tool_get_clinvar_data_by_rcv_code", Some("abc123def".into()), "{}"),
        ];

        let converted = MistralProvider::convert_messages(&messages);
        assert_eq!(converted.len(), 4);

        let wire = serde_json::to_value(&converted).unwrap();
        assert_eq!(wire[2]["role"], "assistant");
        assert_eq!(wire[2]["content"], "");
        assert_eq!(wire[2]["tool_calls"][0]["type"], "function");
        assert_eq!(
            wire[2]["tool_calls"][0]["function"]["arguments"],
            r#"{"rcv":"RCV000009910"}"#
        );
        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["name"], "tool_get_clinvar_data_by_rcv_code");
        assert_eq!(wire[3]["tool_call_id"], "abc123def");
        assert!(wire[1].get("name").is_none());
    }

    #[test]
    fn test_request_body_carries_tool_choice() {
        let options = GenerationOptions::default();
        let tools = vec![json!({"type": "function", "function": {"name": "x"}})];
        let messages = vec![Message::user("hi")];
        let request = ChatRequest {
            messages: &messages,
            tools: &tools,
            tool_choice: ToolChoice::None,
            options: &options,
        };

        let body = serde_json::to_value(MistralProvider::build_body(&request, false)).unwrap();
        assert_eq!(body["tool_choice"], "none");
        assert_eq!(body["tools"].as_array().unwrap().len(), 1);
        assert_eq!(body["stream"], false);

        let bare = ChatRequest { tools: &[], ..request };
        let body = serde_json::to_value(MistralProvider::build_body(&bare, true)).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn test_response_with_tool_calls() {
        let response: WireResponse = serde_json::from_value(json!({
            "model": "mistral-large-latest",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [
                        {"id": "k1", "function": {"name": "tool_get_clinvar_data_by_rcv_code", "arguments": "{\"rcv\":\"RCV000009910\"}"}},
                        {"function": {"name": "tool_query_gnomad_by_rsid", "arguments": {"rsid": "rs334"}}}
                    ]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap();

        let completion = MistralProvider::convert_completion(response).unwrap();
        assert!(completion.content.is_none());
        assert_eq!(completion.finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(completion.tool_calls.len(), 2);
        assert_eq!(completion.tool_calls[0].id.as_deref(), Some("k1"));
        assert_eq!(completion.tool_calls[0].raw_arguments, r#"{"rcv":"RCV000009910"}"#);
        assert_eq!(completion.tool_calls[1].raw_arguments, r#"{"rsid":"rs334"}"#);
        let filled = completion.tool_calls[1].id.as_deref().unwrap();
        assert_eq!(filled.len(), 9);
        assert!(filled.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(completion.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_empty_choices_is_an_error() {
        let response: WireResponse = serde_json::from_value(json!({"model": "m", "choices": []})).unwrap();
        assert!(MistralProvider::convert_completion(response).is_err());
    }

    #[test]
    fn test_sse_decoder_handles_split_lines() {
        let mut decoder = SseDecoder::default();
        let first = decoder.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"Pat");
        assert!(first.is_empty());

        let rest = decoder.push(b"h\"}}]}\n\ndata: [DONE]\n\n");
        assert_eq!(rest.len(), 2);

        let mut calls = ToolCallAssembler::default();
        let chunk = parse_stream_event(&rest[0], &mut calls).unwrap();
        assert_eq!(chunk.delta, "Path");
        assert!(!chunk.done);
        let last = parse_stream_event(&rest[1], &mut calls).unwrap();
        assert!(last.done);
        assert!(last.tool_calls.is_empty());
    }

    #[test]
    fn test_streamed_tool_calls_are_released_on_finish() {
        let mut calls = ToolCallAssembler::default();
        let request = json!({
            "choices": [{
                "delta": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [
                        {"id": "k1x2y3z4w", "index": 0, "function": {"name": "tool_get_clinvar_data_by_rcv_code", "arguments": "{\"rcv\":\"RCV000009910\"}"}},
                        {"id": "m5n6o7p8q", "index": 0, "function": {"name": "tool_query_gnomad_by_rsid", "arguments": "{\"rsid\":\"rs334\"}"}}
                    ]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 30, "total_tokens": 42}
        })
        .to_string();

        let chunk = parse_stream_event(&request, &mut calls).unwrap();
        assert!(chunk.done);
        assert!(chunk.delta.is_empty());
        assert_eq!(chunk.usage.unwrap().total_tokens, 42);

        let names: Vec<&str> = chunk.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["tool_get_clinvar_data_by_rcv_code", "tool_query_gnomad_by_rsid"]);
        assert_eq!(chunk.tool_calls[0].id.as_deref(), Some("k1x2y3z4w"));
        assert_eq!(chunk.tool_calls[1].raw_arguments, r#"{"rsid":"rs334"}"#);

        let done = parse_stream_event("[DONE]", &mut calls).unwrap();
        assert!(done.tool_calls.is_empty());
    }

    #[test]
    fn test_tool_call_fragments_are_joined() {
        let mut calls = ToolCallAssembler::default();
        let events = [
            json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "function": {"name": "tool_get_dbsnp_by_rsid", "arguments": "{\"rs"}}]}}]}),
            json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "function": {"arguments": "id\":\"rs334\"}"}}]}}]}),
            json!({"choices": [{"delta": {"content": ""}, "finish_reason": "tool_calls"}]}),
        ];

        let chunks: Vec<StreamChunk> = events
            .iter()
            .map(|e| parse_stream_event(&e.to_string(), &mut calls).unwrap())
            .collect();

        assert!(chunks[0].tool_calls.is_empty());
        assert!(!chunks[1].done);
        let call = &chunks[2].tool_calls[0];
        assert_eq!(chunks[2].tool_calls.len(), 1);
        assert_eq!(call.name, "tool_get_dbsnp_by_rsid");
        assert_eq!(call.raw_arguments, r#"{"rsid":"rs334"}"#);
        let id = call.id.as_deref().unwrap();
        assert_eq!(id.len(), 9);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(status_error(401, ""), AgentError::Auth(_)));
        assert!(matches!(status_error(429, ""), AgentError::RateLimited(_)));
        assert!(matches!(status_error(503, ""), AgentError::ProviderUnavailable(_)));
        assert!(matches!(status_error(400, "bad"), AgentError::Provider(_)));
    }
}
