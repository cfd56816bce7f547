//! Scripted model for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GenerateOptions, Model, ModelResponse};
use crate::error::LlmError;
use crate::message::{Message, ToolCall};

/// A [`Model`] that replays a fixed queue of responses.
///
/// Every call pops the next response; once the queue is empty the model
/// returns an exhausted error. Received message lists are recorded so tests
/// can assert on what the runner sent.
#[derive(Debug, Default)]
pub struct MockModel {
    responses: Mutex<VecDeque<ModelResponse>>,
    received: Mutex<Vec<Vec<Message>>>,
}

impl MockModel {
    /// Create an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text answer.
    #[must_use]
    pub fn text(self, content: impl Into<String>) -> Self {
        self.push(ModelResponse::new(Message::assistant(content)))
    }

    /// Queue a single tool call.
    #[must_use]
    pub fn tool_call(self, name: &str, arguments: serde_json::Value) -> Self {
        let id = format!("call_{name}");
        self.push(ModelResponse::new(Message::tool_calls(vec![ToolCall::new(
            id, name, arguments,
        )])))
    }

    /// Queue an arbitrary response.
    #[must_use]
    pub fn push(self, response: ModelResponse) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
        self
    }

    /// Message lists received so far, one entry per call.
    #[must_use]
    pub fn received(&self) -> Vec<Vec<Message>> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Model for MockModel {
    fn model_id(&self) -> &str {
        "mock"
    }

    fn provider(&self) -> &'static str {
        "mock"
    }

    async fn generate(
        &self,
        messages: Vec<Message>,
        _options: GenerateOptions,
    ) -> Result<ModelResponse, LlmError> {
        if let Ok(mut received) = self.received.lock() {
            received.push(messages);
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .ok_or_else(|| LlmError::exhausted("mock"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_exhausts() {
        let model = MockModel::new().text("one").text("two");
        let opts = GenerateOptions::new;

        let first = model.generate(vec![Message::user("a")], opts()).await.unwrap();
        assert_eq!(first.text(), Some("one"));
        let second = model.generate(vec![], opts()).await.unwrap();
        assert_eq!(second.text(), Some("two"));
        assert!(model.generate(vec![], opts()).await.is_err());
        assert_eq!(model.received().len(), 3);
    }
}
