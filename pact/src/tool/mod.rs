//! Tool abstractions exposed to the agent runtime.
//!
//! There are two layers:
//!
//! - [`Tool`] is the typed interface tool authors implement. Arguments are a
//!   `serde` + [`schemars`] struct, so the JSON schema handed to the model is
//!   derived from the same type that parses the call.
//! - [`DynTool`] is the object-safe interface the [`Runner`](crate::agent::Runner)
//!   works with. Every [`Tool`] is a [`DynTool`] through a blanket impl.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::error::ToolError;

/// Description of a tool as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name the model uses to call it.
    pub name: String,
    /// What the tool does, written for the model.
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Derive an LLM-friendly JSON schema for `T`.
///
/// The `$schema` and `title` keys are dropped; models only need the object
/// shape.
#[must_use]
pub fn schema_for<T: JsonSchema>() -> Value {
    let mut value = serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.entry("properties")
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    value
}

/// Typed tool interface.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model calls the tool by.
    const NAME: &'static str;

    /// Arguments parsed from the model's JSON.
    type Args: DeserializeOwned + JsonSchema + Send;

    /// Successful output, serialized back to the model.
    type Output: Serialize + Send;

    /// Failure type.
    type Error: Into<ToolError> + Send;

    /// Description shown to the model.
    fn description(&self) -> String;

    /// JSON schema of [`Self::Args`].
    fn parameters_schema(&self) -> Value {
        schema_for::<Self::Args>()
    }

    /// Execute the tool.
    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error>;
}

/// Object-safe tool interface used by the runner.
#[async_trait]
pub trait DynTool: Send + Sync {
    /// Tool name.
    fn name(&self) -> &str;

    /// Tool description.
    fn description(&self) -> String;

    /// Full definition sent to the model.
    fn definition(&self) -> ToolDefinition;

    /// Execute with raw JSON arguments.
    async fn call_json(&self, args: Value) -> Result<Value, ToolError>;
}

#[async_trait]
impl<T: Tool> DynTool for T {
    fn name(&self) -> &str {
        T::NAME
    }

    fn description(&self) -> String {
        Tool::description(self)
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(T::NAME, Tool::description(self), self.parameters_schema())
    }

    async fn call_json(&self, args: Value) -> Result<Value, ToolError> {
        // Models send `null` or omit arguments for parameterless tools.
        let args = match args {
            Value::Null => Value::Object(serde_json::Map::new()),
            Value::String(raw) if raw.trim().is_empty() => Value::Object(serde_json::Map::new()),
            Value::String(raw) => serde_json::from_str(&raw).map_err(|e| {
                ToolError::invalid_args(format!("arguments are not valid JSON: {e}"))
            })?,
            other => other,
        };
        let typed: T::Args = serde_json::from_value(args)?;
        let output = self.call(typed).await.map_err(Into::into)?;
        Ok(serde_json::to_value(output)?)
    }
}

/// A heap-allocated, type-erased tool.
pub type BoxedTool = Box<dyn DynTool>;

impl std::fmt::Debug for dyn DynTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynTool")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Outcome of a single tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    /// Call id.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Output or error.
    pub result: Result<Value, ToolError>,
}

impl ToolCallResult {
    /// Whether the tool succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Render the result as the text fed back to the model.
    #[must_use]
    pub fn to_string_for_llm(&self) -> String {
        match &self.result {
            Ok(Value::String(s)) => s.clone(),
            Ok(value) => value.to_string(),
            Err(e) => format!("Error: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize, JsonSchema)]
    struct AddArgs {
        /// First operand.
        x: i64,
        /// Second operand.
        y: i64,
    }

    struct Adder;

    #[async_trait]
    impl Tool for Adder {
        const NAME: &'static str = "add";
        type Args = AddArgs;
        type Output = i64;
        type Error = ToolError;

        fn description(&self) -> String {
            "Add x and y together".into()
        }

        async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
            Ok(args.x + args.y)
        }
    }

    #[derive(Deserialize, JsonSchema)]
    struct Empty {}

    struct Ping;

    #[async_trait]
    impl Tool for Ping {
        const NAME: &'static str = "ping";
        type Args = Empty;
        type Output = String;
        type Error = ToolError;

        fn description(&self) -> String {
            "Ping".into()
        }

        async fn call(&self, _args: Self::Args) -> Result<Self::Output, Self::Error> {
            Ok("pong".into())
        }
    }

    #[test]
    fn test_definition_derives_schema() {
        let def = DynTool::definition(&Adder);
        assert_eq!(def.name, "add");
        assert_eq!(def.parameters["type"], "object");
        assert!(def.parameters["properties"]["x"].is_object());
        let required = def.parameters["required"].as_array().unwrap();
        assert!(required.contains(&json!("x")));
        assert!(def.parameters.get("$schema").is_none());
    }

    #[tokio::test]
    async fn test_call_json_parses_args() {
        let tool: BoxedTool = Box::new(Adder);
        let out = tool.call_json(json!({"x": 2, "y": 40})).await.unwrap();
        assert_eq!(out, json!(42));
    }

    #[tokio::test]
    async fn test_call_json_rejects_bad_args() {
        let err = Adder.call_json(json!({"x": "two"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_call_json_reports_malformed_arguments() {
        let err = Adder.call_json(json!("{x: 1")).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(err.to_string().contains("arguments are not valid JSON"), "{err}");

        let out = Adder.call_json(json!(r#"{"x": 1, "y": 2}"#)).await.unwrap();
        assert_eq!(out, json!(3));
        assert_eq!(Ping.call_json(json!("")).await.unwrap(), json!("pong"));
    }

    #[tokio::test]
    async fn test_null_args_for_parameterless_tool() {
        let out = Ping.call_json(Value::Null).await.unwrap();
        assert_eq!(out, json!("pong"));
        assert!(DynTool::definition(&Ping).parameters["properties"].is_object());
    }

    #[test]
    fn test_result_rendering() {
        let ok = ToolCallResult {
            id: "1".into(),
            name: "ping".into(),
            result: Ok(json!("pong")),
        };
        assert_eq!(ok.to_string_for_llm(), "pong");

        let err = ToolCallResult {
            id: "2".into(),
            name: "ping".into(),
            result: Err(ToolError::invalid_args("Invalid address.")),
        };
        assert!(!err.is_success());
        assert_eq!(err.to_string_for_llm(), "Error: Invalid arguments: Invalid address.");
    }
}
