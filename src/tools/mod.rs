//! The tool boundary: steps that a model can call by name with serialized
//! arguments, and whose failures come back as text instead of errors.

pub mod parse;

pub use parse::{extract_json, strip_code_fences};

use crate::error::ToolError;
use crate::step::{Step, StepResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// A [`Step`] that describes itself to a model and can be invoked with
/// serialized arguments.
///
/// Implementors override [`Step::name`] with a unique tool name.
#[async_trait]
pub trait Tool: Step<Input: DeserializeOwned, Output: Serialize> {
    /// What the tool does, in words a model can act on.
    fn description(&self) -> &str;

    /// JSON schema of the input.
    fn parameters(&self) -> Value;

    /// Optional longer usage notes.
    fn guide(&self) -> Option<&str> {
        None
    }

    /// Decode `raw`, run, and render the output.
    async fn invoke(&self, raw: &[u8]) -> Result<String, ToolError> {
        let input = decode_arguments::<Self::Input>(raw)?;
        let output = self.run(input).await?;
        render_output(&output)
    }

    /// Like [`invoke`](Tool::invoke), but any failure becomes a
    /// `Tool '<name>' failed: ...` string.
    async fn call_raw(&self, raw: &[u8]) -> String {
        match self.invoke(raw).await {
            Ok(text) => text,
            Err(err) => failure_text(self.name(), &err),
        }
    }

    /// Encode typed arguments and call the tool.
    async fn call<A>(&self, args: &A) -> String
    where
        A: Serialize + Sync + ?Sized,
    {
        match serde_json::to_vec(args) {
            Ok(raw) => self.call_raw(&raw).await,
            Err(e) => failure_text(self.name(), &ToolError::InvalidParameters(e.to_string())),
        }
    }
}

fn failure_text(name: &str, err: &ToolError) -> String {
    format!("Tool '{name}' failed: {err}")
}

fn decode_arguments<T: DeserializeOwned>(raw: &[u8]) -> Result<T, ToolError> {
    let text = std::str::from_utf8(raw).map_err(|e| ToolError::InvalidParameters(e.to_string()))?;
    if text.trim().is_empty() {
        return Err(ToolError::MissingParameters("no arguments given".into()));
    }

    let cleaned = strip_code_fences(text);
    let first = match serde_json::from_str::<T>(&cleaned) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    if let Some(embedded) = extract_json(&cleaned) {
        if let Ok(value) = serde_json::from_str::<T>(embedded) {
            return Ok(value);
        }
    }

    let detail = first.to_string();
    if detail.starts_with("missing field") {
        Err(ToolError::MissingParameters(detail))
    } else {
        Err(ToolError::InvalidParameters(detail))
    }
}

fn render_output<O: Serialize>(output: &O) -> Result<String, ToolError> {
    match serde_json::to_value(output) {
        Ok(Value::String(text)) => Ok(text),
        Ok(value) => Ok(value.to_string()),
        Err(e) => Err(ToolError::ExecutionFailed(e.to_string())),
    }
}

// ---------------------------------------------------------------------------
// ToolBox
// ---------------------------------------------------------------------------

/// Object-safe view of a [`Tool`], for the registry.
#[async_trait]
trait ErasedTool: Send + Sync {
    fn tool_name(&self) -> &str;
    fn tool_description(&self) -> &str;
    fn tool_parameters(&self) -> Value;
    fn tool_guide(&self) -> Option<&str>;
    async fn erased_call(&self, raw: &[u8]) -> String;
}

#[async_trait]
impl<T: Tool> ErasedTool for T {
    fn tool_name(&self) -> &str {
        Step::name(self)
    }

    fn tool_description(&self) -> &str {
        Tool::description(self)
    }

    fn tool_parameters(&self) -> Value {
        Tool::parameters(self)
    }

    fn tool_guide(&self) -> Option<&str> {
        Tool::guide(self)
    }

    async fn erased_call(&self, raw: &[u8]) -> String {
        Tool::call_raw(self, raw).await
    }
}

/// A tool call as a model emits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// What a model needs to know to call one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guide: Option<String>,
}

#[derive(Debug, Error)]
pub enum ToolBoxError {
    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),
    #[error("tool name is empty")]
    EmptyName,
}

pub struct ToolBoxBuilder {
    tools: BTreeMap<String, Arc<dyn ErasedTool>>,
    duplicate: Option<String>,
    empty_name: bool,
}

impl ToolBoxBuilder {
    pub fn register<T: Tool + 'static>(mut self, tool: T) -> Self {
        let name = Step::name(&tool).to_string();
        if name.trim().is_empty() {
            self.empty_name = true;
        }
        if self.tools.contains_key(&name) && self.duplicate.is_none() {
            self.duplicate = Some(name.clone());
        }
        self.tools.insert(name, Arc::new(tool));
        self
    }

    pub fn build(self) -> Result<ToolBox, ToolBoxError> {
        if self.empty_name {
            return Err(ToolBoxError::EmptyName);
        }
        if let Some(name) = self.duplicate {
            return Err(ToolBoxError::DuplicateTool(name));
        }
        Ok(ToolBox { tools: self.tools })
    }
}

/// Tools registered by name. Running a [`ToolCall`] through it never fails:
/// unknown tools and tool failures both come back as text.
pub struct ToolBox {
    tools: BTreeMap<String, Arc<dyn ErasedTool>>,
}

impl ToolBox {
    pub fn builder() -> ToolBoxBuilder {
        ToolBoxBuilder {
            tools: BTreeMap::new(),
            duplicate: None,
            empty_name: false,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Call a tool by name with raw argument bytes.
    pub async fn invoke(&self, name: &str, raw: &[u8]) -> String {
        match self.tools.get(name) {
            Some(tool) => tool.erased_call(raw).await,
            None => format!("Tool '{name}' failed: unknown tool"),
        }
    }

    /// Descriptions of every registered tool, sorted by name.
    pub fn describe(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.tool_name().to_string(),
                description: tool.tool_description().to_string(),
                parameters: tool.tool_parameters(),
                guide: tool.tool_guide().map(str::to_string),
            })
            .collect()
    }
}

/// Absent arguments become empty input. Chat APIs often send the arguments
/// object as a JSON-encoded string; that string is passed through as is.
fn raw_arguments(arguments: &Value) -> Cow<'_, str> {
    match arguments {
        Value::Null => Cow::Borrowed(""),
        Value::String(text) if encodes_structure(text) => Cow::Borrowed(text.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

fn encodes_structure(text: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(strip_code_fences(text).as_str()),
        Ok(Value::Object(_) | Value::Array(_))
    )
}

#[async_trait]
impl Step for ToolBox {
    type Input = ToolCall;
    type Output = String;

    async fn run(&self, call: ToolCall) -> StepResult<String> {
        tracing::debug!(tool = %call.name, "invoking tool");
        let raw = raw_arguments(&call.arguments);
        Ok(self.invoke(&call.name, raw.as_bytes()).await)
    }

    fn name(&self) -> &str {
        "toolbox"
    }
}
