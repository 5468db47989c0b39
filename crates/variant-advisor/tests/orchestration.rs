//! End-to-end turn: model asks for a ClinVar record, the toolbox fetches it
//! from a mock upstream, and the tools-disabled follow-up becomes the answer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use agent_core::provider::{CompletionStream, StreamChunk};
use agent_core::{
    AgentBuilder, AgentError, ChatRequest, Completion, LlmProvider, LoopState, Result, Role, Session, StreamCancel,
    ToolCall, ToolChoice,
};
use variant_advisor::{DEFAULT_MODEL, Endpoints, MockTransport, session_config, tool_registry};

const UPSTREAM: &str = "https://upstream.test";

const CLINVAR_RECORD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ClinVarResult-Set>
  <ClinVarSet ID="104321">
    <ReferenceClinVarAssertion DateLastUpdated="2024-02-20" ID="60917">
      <ClinVarAccession Acc="RCV000009910" Version="8" Type="RCV"/>
      <ClinicalSignificance>
        <Description>Pathogenic</Description>
      </ClinicalSignificance>
      <ObservedIn>
        <Method><MethodType>literature only</MethodType></Method>
      </ObservedIn>
      <MeasureSet Type="Variant">
        <Measure Type="single nucleotide variant">
          <AttributeSet>
            <Attribute Type="MolecularConsequence">missense variant</Attribute>
          </AttributeSet>
        </Measure>
      </MeasureSet>
      <TraitSet Type="Disease">
        <Trait Type="Disease"/>
      </TraitSet>
    </ReferenceClinVarAssertion>
  </ClinVarSet>
</ClinVarResult-Set>"#;

#[derive(Debug, Clone)]
struct Seen {
    tool_choice: ToolChoice,
    last_role: Option<Role>,
    tools: usize,
}

struct ScriptedModel {
    replies: Mutex<VecDeque<Completion>>,
    streams: Mutex<VecDeque<Vec<StreamChunk>>>,
    seen: Mutex<Vec<Seen>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Completion>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            streams: Mutex::new(VecDeque::new()),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn streaming(streams: Vec<Vec<StreamChunk>>) -> Self {
        let model = Self::new(Vec::new());
        *model.streams.lock().unwrap() = streams.into();
        model
    }

    fn record(&self, request: &ChatRequest<'_>) {
        self.seen.lock().unwrap().push(Seen {
            tool_choice: request.tool_choice,
            last_role: request.messages.last().map(|m| m.role),
            tools: request.tools.len(),
        });
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<Completion> {
        self.record(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Provider("script exhausted".into()))
    }

    async fn complete_stream(&self, request: &ChatRequest<'_>) -> Result<CompletionStream> {
        self.record(request);
        let chunks = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Provider("script exhausted".into()))?;
        Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
    }
}

fn clinvar_request() -> Completion {
    Completion::tool_calls(vec![
        ToolCall::new("tool_get_clinvar_data_by_rcv_code", r#"{"rcv":"RCV000009910"}"#).with_id("call_1"),
    ])
}

fn streamed_text(deltas: &[&str]) -> Vec<StreamChunk> {
    let mut chunks: Vec<StreamChunk> = deltas
        .iter()
        .map(|delta| StreamChunk { delta: (*delta).to_string(), ..Default::default() })
        .collect();
    chunks.push(StreamChunk { done: true, ..Default::default() });
    chunks
}

fn streamed_request(completion: Completion) -> Vec<StreamChunk> {
    vec![StreamChunk { tool_calls: completion.tool_calls, done: true, ..Default::default() }]
}

fn transport() -> Arc<MockTransport> {
    Arc::new(MockTransport::new().with_route(format!("{UPSTREAM}/eutils/efetch.fcgi"), 200, CLINVAR_RECORD))
}

const ANSWER: &str = "RCV000009910 is classified as Pathogenic (literature only).";

#[tokio::test]
async fn test_clinvar_question_end_to_end() {
    let transport = transport();
    let registry = tool_registry(transport.clone(), &Endpoints::all_at(UPSTREAM));
    let model = Arc::new(ScriptedModel::new(vec![clinvar_request(), Completion::text(ANSWER)]));
    let agent = AgentBuilder::new()
        .provider(model.clone())
        .tools(registry)
        .model(DEFAULT_MODEL)
        .build()
        .unwrap();

    let mut session = Session::start(&session_config(DEFAULT_MODEL));
    let outcome = agent
        .run_turn(&mut session, "What is the clinical significance of RCV000009910?")
        .await
        .unwrap();

    assert_eq!(outcome.answer, ANSWER);
    assert!(!outcome.cancelled);
    let n = outcome.states.len();
    assert_eq!(outcome.states[n - 2], LoopState::DirectAnswer);
    assert_eq!(outcome.states[n - 1], LoopState::AwaitingUserInput);
    assert!(outcome.states.contains(&LoopState::ExecutingTools));

    // upstream hit once with the requested accession
    let requests = transport.requests().await;
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.ends_with("id=RCV000009910"));

    // tool result recorded and carried into the second call
    assert_eq!(outcome.invocations.len(), 1);
    let result = &outcome.invocations[0].result;
    assert!(result.ok);
    let payload = result.payload.as_ref().unwrap();
    assert_eq!(payload["summary"]["accession"], "RCV000009910");
    assert_eq!(payload["summary"]["clinvar_sig"], "Pathogenic");
    assert_eq!(payload["summary"]["molecular_consq"], "missense variant");
    assert_eq!(payload["summary"]["disease_mech"], "None");

    let seen = model.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].tool_choice, ToolChoice::Auto);
    assert_eq!(seen[0].tools, 8);
    assert_eq!(seen[1].tool_choice, ToolChoice::None);
    assert_eq!(seen[1].last_role, Some(Role::Tool));

    // system, greeting, user, assistant tool request, tool result, answer
    let messages = session.conversation.messages();
    let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::Assistant, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    assert!(messages[3].has_tool_calls());
    assert_eq!(messages[4].tool_name.as_deref(), Some("tool_get_clinvar_data_by_rcv_code"));
    assert_eq!(messages[4].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(messages[5].text(), ANSWER);
}

#[tokio::test]
async fn test_upstream_outage_is_reported_to_the_model() {
    let transport = Arc::new(MockTransport::new().with_route(UPSTREAM, 502, "bad gateway"));
    let registry = tool_registry(transport, &Endpoints::all_at(UPSTREAM));
    let model = Arc::new(ScriptedModel::new(vec![
        clinvar_request(),
        Completion::text("ClinVar is unreachable right now."),
    ]));
    let agent = AgentBuilder::new().provider(model).tools(registry).build().unwrap();

    let mut session = Session::start(&session_config(DEFAULT_MODEL));
    let outcome = agent.run_turn(&mut session, "Check RCV000009910").await.unwrap();

    let result = &outcome.invocations[0].result;
    assert!(!result.ok);
    assert!(result.payload.is_none());

    let tool_message = session
        .conversation
        .messages()
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert!(tool_message.text().contains("HTTP 502"));
    assert_eq!(outcome.answer, "ClinVar is unreachable right now.");
}

#[tokio::test]
async fn test_streamed_answer_after_lookup() {
    let registry = tool_registry(transport(), &Endpoints::all_at(UPSTREAM));
    let model = Arc::new(ScriptedModel::streaming(vec![
        streamed_request(clinvar_request()),
        streamed_text(&["RCV000009910 ", "is ", "Pathogenic."]),
    ]));
    let agent = AgentBuilder::new().provider(model.clone()).tools(registry).build().unwrap();

    let mut session = Session::start(&session_config(DEFAULT_MODEL));
    let (_handle, cancel) = StreamCancel::pair();
    let mut rendered = String::new();
    let outcome = agent
        .run_turn_streaming(&mut session, "Is RCV000009910 pathogenic?", Some(cancel), |delta| {
            rendered.push_str(delta);
        })
        .await
        .unwrap();

    assert_eq!(rendered, "RCV000009910 is Pathogenic.");
    assert_eq!(outcome.answer, rendered);
    assert_eq!(session.conversation.last().map(|m| m.text()), Some(rendered.as_str()));
    assert_eq!(outcome.invocations.len(), 1);
    assert!(outcome.invocations[0].result.ok);

    let seen = model.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].tool_choice, ToolChoice::Auto);
    assert_eq!(seen[1].tool_choice, ToolChoice::None);
    assert_eq!(seen[1].last_role, Some(Role::Tool));
}
