//! Agent definition and builder.

use std::sync::Arc;

use schemars::JsonSchema;
use serde_json::Value;

use super::result::AgentReply;
use crate::providers::{Model, SharedModel};
use crate::tool::{BoxedTool, DynTool, ToolDefinition, schema_for};

/// Default step limit of a run.
pub const DEFAULT_MAX_STEPS: usize = 10;

/// System prompt of the blockchain agent.
pub const SYSTEM_PROMPT: &str =
    "Use ONLY the tools provided. NEVER respond with instructions. Return valid JSON with tool calls.";

/// A JSON schema the final answer must follow.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    /// Schema name.
    pub name: String,
    /// JSON schema.
    pub schema: Value,
}

impl OutputSchema {
    /// Schema derived from `T`.
    #[must_use]
    pub fn of<T: JsonSchema>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: schema_for::<T>(),
        }
    }
}

/// An agent: instructions, a model, tools and limits.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use pact::agent::Agent;
/// use pact::providers::OllamaClient;
///
/// let model = OllamaClient::new().completion_model("mistral-nemo");
/// let agent = Agent::new("pact")
///     .instructions("Use ONLY the tools provided.")
///     .model(Arc::new(model))
///     .structured_reply();
/// ```
pub struct Agent {
    pub(crate) name: String,
    pub(crate) instructions: String,
    pub(crate) model: Option<SharedModel>,
    pub(crate) tools: Vec<BoxedTool>,
    pub(crate) max_steps: usize,
    pub(crate) output_schema: Option<OutputSchema>,
    pub(crate) temperature: Option<f32>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model.as_ref().map(|m| m.model_id()))
            .field("tools", &self.tool_names())
            .field("max_steps", &self.max_steps)
            .field("structured", &self.output_schema.is_some())
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Create an agent with no model, no tools and default limits.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: String::new(),
            model: None,
            tools: Vec::new(),
            max_steps: DEFAULT_MAX_STEPS,
            output_schema: None,
            temperature: None,
        }
    }

    /// The blockchain agent: [`SYSTEM_PROMPT`], the given tools and the
    /// `{tool_used, result}` reply format.
    #[must_use]
    pub fn pact(model: SharedModel, tools: Vec<BoxedTool>) -> Self {
        Self::new("pact")
            .instructions(SYSTEM_PROMPT)
            .model(model)
            .tools(tools)
            .structured_reply()
    }

    /// Set the system instructions.
    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Set the model.
    #[must_use]
    pub fn model(mut self, model: Arc<dyn Model>) -> Self {
        self.model = Some(model);
        self
    }

    /// Add one tool.
    #[must_use]
    pub fn tool(mut self, tool: impl DynTool + 'static) -> Self {
        self.tools.push(Box::new(tool));
        self
    }

    /// Add several tools.
    #[must_use]
    pub fn tools(mut self, tools: Vec<BoxedTool>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Set the step limit.
    #[must_use]
    pub const fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Require the final answer to follow `schema`.
    #[must_use]
    pub fn output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Require the `{tool_used, result}` reply format.
    #[must_use]
    pub fn structured_reply(self) -> Self {
        self.output_schema(OutputSchema::of::<AgentReply>("agent_reply"))
    }

    /// Agent name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// System instructions.
    #[must_use]
    pub fn get_instructions(&self) -> &str {
        &self.instructions
    }

    /// Names of the registered tools.
    #[must_use]
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Definitions sent to the model.
    #[must_use]
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockModel;
    use crate::tools::MultiplyTool;

    #[test]
    fn test_builder() {
        let agent = Agent::new("a")
            .instructions("be brief")
            .tool(MultiplyTool)
            .max_steps(3);
        assert_eq!(agent.name(), "a");
        assert_eq!(agent.get_instructions(), "be brief");
        assert_eq!(agent.tool_names(), vec!["multiply"]);
        assert_eq!(agent.max_steps, 3);
        assert!(agent.model.is_none());
        assert!(agent.output_schema.is_none());
    }

    #[test]
    fn test_pact_preset() {
        let agent = Agent::pact(Arc::new(MockModel::new()), vec![Box::new(MultiplyTool)]);
        assert_eq!(agent.get_instructions(), SYSTEM_PROMPT);
        assert_eq!(agent.max_steps, DEFAULT_MAX_STEPS);
        let schema = agent.output_schema.as_ref().unwrap();
        let props = schema.schema["properties"].as_object().unwrap();
        assert!(props.contains_key("tool_used"));
        assert!(props.contains_key("result"));
        assert!(format!("{agent:?}").contains("mock"));
    }
}
