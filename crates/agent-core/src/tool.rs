//! Tool System
//!
//! Closed-set tool dispatch for model-issued tool calls.
//!
//! A domain crate declares its tools as a `Copy` enum implementing
//! [`ToolKind`] and executes them through a [`Toolbox`]. The model only ever
//! supplies a name string; [`ToolRegistry::resolve`] maps that string onto an
//! enum variant by exact match before anything runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{AgentError, Result};

/// Length of a generated tool-call id; Mistral rejects any other shape
pub const CALL_ID_LEN: usize = 9;

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Tool identifier, as written by the model
    pub name: String,

    /// JSON-encoded arguments, verbatim
    pub raw_arguments: String,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, raw_arguments: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            raw_arguments: raw_arguments.into(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// A fresh id of `CALL_ID_LEN` alphanumeric characters
    pub fn generate_id() -> String {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(CALL_ID_LEN);
        id
    }

    /// Assign a generated id when the provider sent none (or an empty one)
    pub fn ensure_id(&mut self) -> &str {
        if self.id.as_deref().is_none_or(str::is_empty) {
            self.id = Some(Self::generate_id());
        }
        self.id.as_deref().unwrap_or_default()
    }

    /// Decode `raw_arguments` into a JSON object
    pub fn parse_arguments(&self) -> Result<ToolArguments> {
        let malformed = |reason: String| AgentError::MalformedToolArguments {
            tool: self.name.clone(),
            reason,
        };

        match serde_json::from_str::<Value>(&self.raw_arguments) {
            Ok(Value::Object(map)) => Ok(ToolArguments(map)),
            Ok(other) => Err(malformed(format!("expected a JSON object, got {other}"))),
            Err(e) => Err(malformed(e.to_string())),
        }
    }
}

/// Decoded tool arguments
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolArguments(Map<String, Value>);

impl ToolArguments {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// A string argument the tool cannot run without
    pub fn require_str(&self, name: &str) -> Result<&str> {
        self.get_str(name)
            .ok_or_else(|| AgentError::ToolValidation(format!("Missing required parameter: {name}")))
    }
}

impl From<Map<String, Value>> for ToolArguments {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Normalized outcome of a tool invocation.
///
/// `ok = false` is an ordinary value: the caller branches on it and the
/// payload is always `None` in that case.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LookupResult {
    /// Whether the lookup succeeded
    pub ok: bool,

    /// Structured result data
    pub payload: Option<Value>,

    /// Human-readable failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LookupResult {
    pub const fn success(payload: Value) -> Self {
        Self {
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            payload: None,
            error: Some(error.into()),
        }
    }

    /// Serialize for a tool-role message
    pub fn to_message_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            json!({ "ok": false, "payload": null, "error": e.to_string() }).to_string()
        })
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,
}

impl ParameterSchema {
    /// A required string parameter
    pub fn required_string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: "string".into(),
            description: description.into(),
            required: true,
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self.param_type.as_str() {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.is_i64() || value.is_u64(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        }
    }
}

/// Tool definition advertised to the model
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSpec {
    /// Render as a function-calling catalogue entry
    pub fn to_function_definition(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    json!({ "type": p.param_type, "description": p.description }),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                },
            },
        })
    }
}

/// A closed set of tool identifiers
pub trait ToolKind: Copy + Send + Sync + std::fmt::Debug + 'static {
    /// Every variant, in catalogue order
    fn all() -> &'static [Self];

    /// Name the model uses to request this tool
    fn name(self) -> &'static str;

    /// Schema advertised to the model
    fn spec(self) -> ToolSpec;
}

/// Executes resolved tools
#[async_trait]
pub trait Toolbox: Send + Sync {
    type Kind: ToolKind;

    /// Run one tool. Failures are reported in the returned value.
    async fn invoke(&self, kind: Self::Kind, args: &ToolArguments) -> LookupResult;
}

/// Registry binding tool names to a toolbox
pub struct ToolRegistry<T: Toolbox> {
    toolbox: T,
    specs: Vec<ToolSpec>,
}

impl<T: Toolbox> ToolRegistry<T> {
    pub fn new(toolbox: T) -> Self {
        let specs = T::Kind::all().iter().map(|k| k.spec()).collect();
        Self { toolbox, specs }
    }

    /// Map a model-supplied name onto a tool, by exact match only
    pub fn resolve(&self, name: &str) -> Result<T::Kind> {
        T::Kind::all()
            .iter()
            .copied()
            .find(|k| k.name() == name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    /// Schema of a registered tool
    pub fn schema_for(&self, name: &str) -> Result<&ToolSpec> {
        self.specs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    /// All tool schemas, in catalogue order
    pub fn all_specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Function definitions sent to the model
    pub fn catalogue(&self) -> Vec<Value> {
        self.specs.iter().map(ToolSpec::to_function_definition).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Check required parameters are present and correctly typed
    pub fn validate(&self, kind: T::Kind, args: &ToolArguments) -> Result<()> {
        let spec = self.schema_for(kind.name())?;

        for param in &spec.parameters {
            match args.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(AgentError::ToolValidation(format!(
                        "Missing required parameter: {}",
                        param.name
                    )));
                }
                Some(value) if !value.is_null() && !param.accepts(value) => {
                    return Err(AgentError::ToolValidation(format!(
                        "Parameter '{}' must be of type {}",
                        param.name, param.param_type
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    async fn try_execute(&self, call: &ToolCall) -> Result<LookupResult> {
        let args = call.parse_arguments()?;
        let kind = self.resolve(&call.name)?;
        self.validate(kind, &args)?;
        Ok(self.toolbox.invoke(kind, &args).await)
    }

    /// Execute a tool call. Never fails: errors become `ok = false` results.
    pub async fn execute(&self, call: &ToolCall) -> LookupResult {
        match self.try_execute(call).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool call rejected");
                LookupResult::failure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum EchoTool {
        Echo,
        Fail,
    }

    impl ToolKind for EchoTool {
        fn all() -> &'static [Self] {
            &[Self::Echo, Self::Fail]
        }

        fn name(self) -> &'static str {
            match self {
                Self::Echo => "echo",
                Self::Fail => "fail",
            }
        }

        fn spec(self) -> ToolSpec {
            ToolSpec {
                name: self.name().into(),
                description: "test tool".into(),
                parameters: vec![ParameterSchema::required_string("text", "text to echo")],
            }
        }
    }

    pub struct EchoToolbox;

    #[async_trait]
    impl Toolbox for EchoToolbox {
        type Kind = EchoTool;

        async fn invoke(&self, kind: EchoTool, args: &ToolArguments) -> LookupResult {
            match kind {
                EchoTool::Echo => LookupResult::success(json!({ "echo": args.get_str("text") })),
                EchoTool::Fail => LookupResult::failure("upstream returned HTTP 500: API request failed"),
            }
        }
    }

    #[test]
    fn test_generated_ids_fit_mistral() {
        let id = ToolCall::generate_id();
        assert_eq!(id.len(), CALL_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, ToolCall::generate_id());

        let mut call = ToolCall::new("echo", "{}").with_id("");
        assert_eq!(call.ensure_id().len(), 9);

        let mut kept = ToolCall::new("echo", "{}").with_id("abc123def");
        assert_eq!(kept.ensure_id(), "abc123def");
    }

    #[test]
    fn test_resolve_is_name_exact() {
        let registry = ToolRegistry::new(EchoToolbox);
        assert_eq!(registry.resolve("echo").unwrap(), EchoTool::Echo);
        assert!(matches!(registry.resolve("Echo"), Err(AgentError::UnknownTool(_))));
        assert!(matches!(registry.resolve("ech"), Err(AgentError::UnknownTool(_))));
    }

    #[test]
    fn test_catalogue_shape() {
        let registry = ToolRegistry::new(EchoToolbox);
        let catalogue = registry.catalogue();
        assert_eq!(catalogue.len(), 2);

        let echo = &catalogue[0];
        assert_eq!(echo["type"], "function");
        assert_eq!(echo["function"]["name"], "echo");
        assert_eq!(echo["function"]["parameters"]["type"], "object");
        assert_eq!(echo["function"]["parameters"]["properties"]["text"]["type"], "string");
        assert_eq!(echo["function"]["parameters"]["required"], json!(["text"]));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_value() {
        let registry = ToolRegistry::new(EchoToolbox);
        let result = registry.execute(&ToolCall::new("delete_everything", "{}")).await;
        assert!(!result.ok);
        assert!(result.payload.is_none());
        assert!(result.error.unwrap().contains("delete_everything"));
    }

    #[tokio::test]
    async fn test_malformed_arguments_are_a_value() {
        let registry = ToolRegistry::new(EchoToolbox);

        let result = registry.execute(&ToolCall::new("echo", "{\"text\": ")).await;
        assert!(!result.ok);
        assert!(result.error.unwrap().starts_with("Malformed arguments"));

        let result = registry.execute(&ToolCall::new("echo", "[\"text\"]")).await;
        assert!(!result.ok);
    }

    #[tokio::test]
    async fn test_validation() {
        let registry = ToolRegistry::new(EchoToolbox);

        let missing = registry.execute(&ToolCall::new("echo", "{}")).await;
        assert_eq!(missing.error.as_deref(), Some("Tool validation error: Missing required parameter: text"));

        let wrong_type = registry.execute(&ToolCall::new("echo", r#"{"text": 5}"#)).await;
        assert!(!wrong_type.ok);

        let ok = registry.execute(&ToolCall::new("echo", r#"{"text": "hi"}"#)).await;
        assert!(ok.ok);
        assert_eq!(ok.payload, Some(json!({ "echo": "hi" })));
    }

    #[test]
    fn test_lookup_result_content() {
        let content = LookupResult::failure("boom").to_message_content();
        let parsed: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, json!({ "ok": false, "payload": null, "error": "boom" }));
    }
}
