//! Ollama Chat API implementation of [`Model`].

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use super::client::OllamaClient;
use crate::error::LlmError;
use crate::message::{Message, Role, ToolCall};
use crate::providers::{GenerateOptions, Model, ModelResponse, TokenUsage, saturating_u32};

/// Ollama chat completion model.
#[derive(Clone)]
pub struct CompletionModel {
    client: OllamaClient,
    model_id: String,
    /// Default number of tokens to predict.
    pub num_predict: Option<u32>,
    /// Keep model loaded in memory.
    pub keep_alive: Option<String>,
}

impl std::fmt::Debug for CompletionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionModel")
            .field("model_id", &self.model_id)
            .field("num_predict", &self.num_predict)
            .field("keep_alive", &self.keep_alive)
            .finish_non_exhaustive()
    }
}

impl CompletionModel {
    pub(super) fn new(client: OllamaClient, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
            num_predict: None,
            keep_alive: None,
        }
    }

    /// Set the number of tokens to predict.
    #[must_use]
    pub const fn with_num_predict(mut self, num_predict: u32) -> Self {
        self.num_predict = Some(num_predict);
        self
    }

    /// Set `keep_alive` duration (e.g., "5m", "1h", "-1" for indefinite).
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }

    fn message_to_json(msg: &Message) -> Value {
        let mut obj = serde_json::json!({
            "role": msg.role.as_str(),
            "content": msg.content.clone().unwrap_or_default(),
        });

        if let Some(tool_calls) = &msg.tool_calls {
            let calls: Vec<Value> = tool_calls
                .iter()
                .enumerate()
                .map(|(i, tc)| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "index": i,
                            "name": tc.name,
                            "arguments": tc.arguments,
                        }
                    })
                })
                .collect();
            obj["tool_calls"] = Value::Array(calls);
        }

        if msg.role == Role::Tool
            && let Some(name) = &msg.name
        {
            obj["tool_name"] = Value::String(name.clone());
        }

        obj
    }

    /// Build the request body for `/api/chat`.
    fn build_request_body(&self, messages: &[Message], options: &GenerateOptions) -> Value {
        let api_messages: Vec<Value> = messages.iter().map(Self::message_to_json).collect();

        let mut body = serde_json::json!({
            "model": self.model_id,
            "messages": api_messages,
            "stream": false,
        });

        let mut opts = serde_json::Map::new();
        if let Some(temp) = options.temperature {
            opts.insert("temperature".to_string(), serde_json::json!(temp));
        }
        if let Some(max_tokens) = options.max_tokens.or(self.num_predict) {
            opts.insert("num_predict".to_string(), serde_json::json!(max_tokens));
        }
        if !opts.is_empty() {
            body["options"] = Value::Object(opts);
        }

        if let Some(keep_alive) = &self.keep_alive {
            body["keep_alive"] = serde_json::json!(keep_alive);
        }

        if let Some(tools) = &options.tools
            && !tools.is_empty()
        {
            let defs: Vec<Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(defs);
        }

        // Ollama accepts a JSON schema in `format` for structured output.
        if let Some(schema) = &options.response_format {
            body["format"] = schema.clone();
        }

        body
    }

    /// Parse a `/api/chat` response body.
    fn parse_response(json: Value) -> Result<ModelResponse, LlmError> {
        let message_json = json
            .get("message")
            .ok_or_else(|| LlmError::response_format("object with 'message'", json.to_string()))?;

        let content = message_json["content"].as_str().map(String::from);

        let tool_calls = message_json["tool_calls"].as_array().and_then(|arr| {
            let calls: Vec<ToolCall> = arr
                .iter()
                .enumerate()
                .filter_map(|(i, tc)| {
                    let name = tc["function"]["name"].as_str()?.to_string();
                    let arguments = match &tc["function"]["arguments"] {
                        // Undecodable text is kept so the tool can report why.
                        Value::String(raw) => serde_json::from_str(raw)
                            .unwrap_or_else(|_| Value::String(raw.clone())),
                        other => other.clone(),
                    };
                    Some(ToolCall::new(format!("call_{i}"), name, arguments))
                })
                .collect();
            (!calls.is_empty()).then_some(calls)
        });

        let message = Message {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
            name: None,
        };

        let token_usage = json.get("prompt_eval_count").map(|prompt| {
            TokenUsage::new(
                saturating_u32(prompt.as_u64().unwrap_or(0)),
                saturating_u32(json["eval_count"].as_u64().unwrap_or(0)),
            )
        });

        Ok(ModelResponse {
            message,
            token_usage,
            raw: Some(json),
        })
    }
}

#[async_trait]
impl Model for CompletionModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider(&self) -> &'static str {
        "ollama"
    }

    #[instrument(skip(self, messages, options), fields(model = %self.model_id))]
    async fn generate(
        &self,
        messages: Vec<Message>,
        options: GenerateOptions,
    ) -> Result<ModelResponse, LlmError> {
        let body = self.build_request_body(&messages, &options);
        let url = format!("{}/api/chat", self.client.base_url());

        if let Some(tools) = body.get("tools") {
            debug!(tools = %tools, "Sending request with tools");
        } else {
            debug!("Sending request to Ollama API");
        }

        let response = self
            .client
            .http_client()
            .post(&url)
            .headers(OllamaClient::headers())
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from(e).with_provider("ollama"))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::http_status(status.as_u16(), error_text).with_provider("ollama"));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| LlmError::from(e).with_provider("ollama"))?;
        debug!(response = %json, "Ollama API response");
        Self::parse_response(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolDefinition;
    use serde_json::json;

    fn model() -> CompletionModel {
        OllamaClient::new().completion_model("mistral-nemo")
    }

    #[test]
    fn test_request_body_includes_tools_and_tool_name() {
        let call = ToolCall::new("call_0", "multiply", json!({"a": 2, "b": 3}));
        let messages = vec![
            Message::system("sys"),
            Message::user("2*3?"),
            Message::tool_calls(vec![call.clone()]),
            Message::tool(&call, "6"),
        ];
        let options = GenerateOptions::new().temperature(0.0).tools(vec![ToolDefinition::new(
            "multiply",
            "Multiply",
            json!({"type": "object"}),
        )]);

        let body = model().build_request_body(&messages, &options);
        assert_eq!(body["model"], "mistral-nemo");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][2]["tool_calls"][0]["function"]["name"], "multiply");
        assert_eq!(body["messages"][3]["role"], "tool");
        assert_eq!(body["messages"][3]["tool_name"], "multiply");
        assert_eq!(body["tools"][0]["function"]["name"], "multiply");
        assert_eq!(body["options"]["temperature"], 0.0);
        assert!(body.get("format").is_none());
    }

    #[test]
    fn test_request_body_format() {
        let schema = json!({"type": "object"});
        let body = model()
            .with_keep_alive("5m")
            .build_request_body(&[], &GenerateOptions::new().response_format(schema.clone()));
        assert_eq!(body["format"], schema);
        assert_eq!(body["keep_alive"], "5m");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_parse_tool_calls() {
        let raw = json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "getEthBalance", "arguments": {"address": "0xabc"}}},
                    {"function": {"name": "multiply", "arguments": "{\"a\":1,\"b\":2}"}},
                    {"function": {"name": "multiply", "arguments": "{a: 1"}}
                ]
            },
            "prompt_eval_count": 12,
            "eval_count": 3
        });
        let response = CompletionModel::parse_response(raw).unwrap();
        let calls = response.tool_calls().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].id, "call_0");
        assert_eq!(calls[0].arguments["address"], "0xabc");
        assert_eq!(calls[1].arguments["b"], 2);
        assert_eq!(calls[2].arguments, json!("{a: 1"));
        assert_eq!(response.token_usage, Some(TokenUsage::new(12, 3)));
        assert!(response.text().is_none());
    }

    #[test]
    fn test_parse_text_and_missing_message() {
        let response =
            CompletionModel::parse_response(json!({"message": {"content": "hi"}})).unwrap();
        assert_eq!(response.text(), Some("hi"));
        assert!(response.token_usage.is_none());

        assert!(CompletionModel::parse_response(json!({"error": "x"})).is_err());
    }
}
