//! Run configuration and results.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::memory::SharedSession;
use crate::message::ToolCall;
use crate::providers::TokenUsage;

/// The agent's final answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AgentReply {
    /// Name of the tool the answer is based on, or `none`.
    pub tool_used: String,
    /// Answer for the user.
    #[serde(deserialize_with = "string_or_json")]
    pub result: String,
}

fn string_or_json<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        other => other.to_string(),
    })
}

impl AgentReply {
    /// A reply not tied to any tool.
    #[must_use]
    pub fn fallback(result: impl Into<String>) -> Self {
        Self {
            tool_used: "none".into(),
            result: result.into(),
        }
    }

    /// Parse a reply from model text.
    ///
    /// Accepts bare JSON, JSON in a Markdown code fence, or JSON embedded in
    /// surrounding prose.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let body = strip_fence(text.trim());
        if let Ok(reply) = serde_json::from_str(body) {
            return Some(reply);
        }
        let start = body.find('{')?;
        let end = body.rfind('}')?;
        if end <= start {
            return None;
        }
        serde_json::from_str(&body[start..=end]).ok()
    }
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`) on the opening line.
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Per-run options.
#[derive(Clone, Default)]
pub struct RunConfig {
    /// Conversation history loaded before and appended after the run.
    pub session: Option<SharedSession>,
    /// Overrides the agent's step limit.
    pub max_steps: Option<usize>,
    /// Only the latest `n` history messages are sent.
    pub history_limit: Option<usize>,
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("session", &self.session.as_ref().map(|s| s.id().to_string()))
            .field("max_steps", &self.max_steps)
            .field("history_limit", &self.history_limit)
            .finish()
    }
}

impl RunConfig {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `session` for history.
    #[must_use]
    pub fn session(mut self, session: SharedSession) -> Self {
        self.session = Some(session);
        self
    }

    /// Override the step limit.
    #[must_use]
    pub const fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Limit the history sent to the model.
    #[must_use]
    pub const fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }
}

/// What the runner does after a model response.
#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    /// Execute these tool calls and loop.
    ToolCalls {
        /// Requested calls.
        calls: Vec<ToolCall>,
    },
    /// Stop with this text.
    FinalOutput {
        /// Final text, possibly empty.
        output: String,
    },
}

/// One executed tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    /// Call id.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Arguments as sent by the model.
    pub arguments: Value,
    /// Text fed back to the model.
    pub result: String,
    /// Whether the tool succeeded.
    pub success: bool,
}

/// One model turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInfo {
    /// 1-based step number.
    pub step: usize,
    /// Tool calls executed in this step.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Final text, on the last step.
    pub output: Option<String>,
}

/// Outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Structured answer.
    pub reply: AgentReply,
    /// Raw final text of the model.
    pub output: String,
    /// Steps taken.
    pub steps: usize,
    /// Per-step details.
    pub step_history: Vec<StepInfo>,
    /// Accumulated token usage.
    pub usage: TokenUsage,
    /// Name of the agent that ran.
    pub agent_name: String,
}

impl RunResult {
    /// Names of all tools called during the run, in order.
    #[must_use]
    pub fn tools_called(&self) -> Vec<&str> {
        self.step_history
            .iter()
            .flat_map(|s| s.tool_calls.iter().map(|c| c.name.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let reply = AgentReply::parse(r#"{"tool_used":"multiply","result":"42"}"#).unwrap();
        assert_eq!(reply.tool_used, "multiply");
        assert_eq!(reply.result, "42");
    }

    #[test]
    fn test_parse_fenced_and_embedded() {
        let fenced = "```json\n{\"tool_used\": \"getEthPriceUsd\", \"result\": \"$3000\"}\n```";
        assert_eq!(AgentReply::parse(fenced).unwrap().tool_used, "getEthPriceUsd");

        let prose = "Sure! {\"tool_used\": \"none\", \"result\": \"hi\"} Anything else?";
        assert_eq!(AgentReply::parse(prose).unwrap().result, "hi");
    }

    #[test]
    fn test_parse_non_string_result() {
        let reply = AgentReply::parse(r#"{"tool_used":"multiply","result":42}"#).unwrap();
        assert_eq!(reply.result, "42");
    }

    #[test]
    fn test_parse_rejects() {
        assert!(AgentReply::parse("The answer is 42.").is_none());
        assert!(AgentReply::parse(r#"{"answer": 1}"#).is_none());
        assert!(AgentReply::parse("} {").is_none());
    }

    #[test]
    fn test_fallback() {
        let reply = AgentReply::fallback("plain");
        assert_eq!(reply.tool_used, "none");
        assert_eq!(reply.result, "plain");
    }
}
