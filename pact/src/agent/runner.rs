//! Runner: the agent execution loop.
//!
//! The [`Runner`] drives an [`Agent`] through its reasoning loop:
//!
//! 1. Build messages from instructions, session history and the user input
//! 2. Call the model with the tool definitions
//! 3. Classify the response into a [`NextStep`]
//! 4. Execute tool calls concurrently and append their results
//! 5. Loop until the model answers with text or the step limit is hit
//!
//! The final text is parsed into an [`AgentReply`]. When it is not valid
//! reply JSON and the agent has an output schema, the model gets one more
//! call constrained to that schema before the runner falls back to the raw
//! text.

use tracing::{debug, info, warn};

use super::config::Agent;
use super::result::{AgentReply, NextStep, RunConfig, RunResult, StepInfo, ToolCallRecord};
use crate::error::{Error, Result, ToolError};
use crate::message::{Message, Role, ToolCall};
use crate::providers::{GenerateOptions, Model, ModelResponse, TokenUsage, ToolChoice};
use crate::tool::{ToolCallResult, ToolDefinition};

/// Stateless execution engine for [`Agent`]s.
///
/// All per-run state lives inside [`Runner::run`], so one agent can serve
/// concurrent runs on different sessions.
#[derive(Debug, Clone, Copy)]
pub struct Runner;

impl Runner {
    /// Run `agent` on `input` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Agent`] when the agent has no model,
    /// [`Error::MaxSteps`] when the step limit is exceeded, and propagates
    /// model and session errors. Tool failures are fed back to the model and
    /// never abort the run.
    pub async fn run(agent: &Agent, input: &str, config: RunConfig) -> Result<RunResult> {
        let model = agent.model.as_deref().ok_or_else(|| {
            Error::agent(format!(
                "Agent '{}' has no model configured. Call .model() before running.",
                agent.name
            ))
        })?;
        let max_steps = config.max_steps.unwrap_or(agent.max_steps);

        let mut messages = Vec::new();
        if !agent.instructions.is_empty() {
            messages.push(Message::system(&agent.instructions));
        }
        if let Some(session) = &config.session {
            let history = session.get_messages(config.history_limit).await?;
            messages.extend(trim_to_user_turn(history));
        }
        let turn_start = messages.len();
        messages.push(Message::user(input));

        let definitions = agent.tool_definitions();
        let mut step_history = Vec::new();
        let mut usage = TokenUsage::default();

        for step in 1..=max_steps {
            debug!(agent = %agent.name, step, "Starting step");

            let options = Self::step_options(agent, &definitions);
            let response = model.generate(messages.clone(), options).await?;
            if let Some(u) = response.token_usage {
                usage += u;
            }

            match Self::classify_response(&response) {
                NextStep::ToolCalls { calls } => {
                    messages.push(response.message);
                    let records = Self::execute_tool_calls(agent, &calls, &mut messages).await;
                    step_history.push(StepInfo {
                        step,
                        tool_calls: records,
                        output: None,
                    });
                }
                NextStep::FinalOutput { output } => {
                    messages.push(response.message);
                    let reply = match AgentReply::parse(&output) {
                        Some(reply) => reply,
                        None => Self::coerce_reply(agent, model, &messages, &output, &mut usage)
                            .await,
                    };
                    step_history.push(StepInfo {
                        step,
                        tool_calls: Vec::new(),
                        output: Some(output.clone()),
                    });

                    if let Some(session) = &config.session {
                        session.add_messages(&messages[turn_start..]).await?;
                    }

                    info!(
                        agent = %agent.name,
                        steps = step,
                        tool = %reply.tool_used,
                        "Run finished"
                    );
                    return Ok(RunResult {
                        reply,
                        output,
                        steps: step,
                        step_history,
                        usage,
                        agent_name: agent.name.clone(),
                    });
                }
            }
        }

        warn!(agent = %agent.name, max_steps, "Step limit reached");
        Err(Error::max_steps(max_steps))
    }

    fn step_options(agent: &Agent, definitions: &[ToolDefinition]) -> GenerateOptions {
        let mut options = GenerateOptions::new();
        if !definitions.is_empty() {
            options = options
                .tools(definitions.to_vec())
                .tool_choice(ToolChoice::Auto);
        }
        if let Some(t) = agent.temperature {
            options = options.temperature(t);
        }
        options
    }

    /// Classify a model response into a [`NextStep`].
    fn classify_response(response: &ModelResponse) -> NextStep {
        match response.tool_calls() {
            Some(calls) if !calls.is_empty() => NextStep::ToolCalls {
                calls: calls.to_vec(),
            },
            _ => NextStep::FinalOutput {
                output: response.text().unwrap_or_default().to_owned(),
            },
        }
    }

    /// Execute tool calls concurrently and append results in call order.
    async fn execute_tool_calls(
        agent: &Agent,
        calls: &[ToolCall],
        messages: &mut Vec<Message>,
    ) -> Vec<ToolCallRecord> {
        let futs = calls.iter().map(|call| Self::execute_single_tool(agent, call));
        let records = futures::future::join_all(futs).await;

        for (call, record) in calls.iter().zip(&records) {
            messages.push(Message::tool(call, &record.result));
        }
        records
    }

    async fn execute_single_tool(agent: &Agent, call: &ToolCall) -> ToolCallRecord {
        let result = match agent.tools.iter().find(|t| t.name() == call.name) {
            Some(tool) => tool.call_json(call.arguments.clone()).await,
            None => {
                warn!(tool = %call.name, "Tool not found");
                Err(ToolError::not_found(&call.name))
            }
        };
        let result = ToolCallResult {
            id: call.id.clone(),
            name: call.name.clone(),
            result,
        };
        if let Err(e) = &result.result {
            debug!(tool = %call.name, error = %e, "Tool failed");
        }
        ToolCallRecord {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result: result.to_string_for_llm(),
            success: result.is_success(),
        }
    }

    /// Turn a non-JSON final answer into an [`AgentReply`].
    ///
    /// With an output schema the model is asked once more, tools disabled and
    /// the answer constrained to the schema. Any failure falls back to the
    /// raw text.
    async fn coerce_reply(
        agent: &Agent,
        model: &dyn Model,
        messages: &[Message],
        output: &str,
        usage: &mut TokenUsage,
    ) -> AgentReply {
        let Some(schema) = &agent.output_schema else {
            return AgentReply::fallback(output);
        };
        debug!(agent = %agent.name, schema = %schema.name, "Requesting structured reply");

        let mut options = GenerateOptions::new().response_format(schema.schema.clone());
        if let Some(t) = agent.temperature {
            options = options.temperature(t);
        }
        match model.generate(messages.to_vec(), options).await {
            Ok(response) => {
                if let Some(u) = response.token_usage {
                    *usage += u;
                }
                response
                    .text()
                    .and_then(AgentReply::parse)
                    .unwrap_or_else(|| AgentReply::fallback(output))
            }
            Err(e) => {
                warn!(error = %e, "Structured reply failed, using raw text");
                AgentReply::fallback(output)
            }
        }
    }
}

/// Drop leading history until the first user message.
///
/// A limited window can start mid-turn; orphaned tool results or an
/// assistant tool call without its answers are rejected by chat models.
fn trim_to_user_turn(mut history: Vec<Message>) -> Vec<Message> {
    let start = history
        .iter()
        .position(|m| m.role == Role::User)
        .unwrap_or(history.len());
    history.drain(..start);
    history
}
