//! Mock LLM provider for deterministic testing.
//!
//! Returns pre-configured responses without making any HTTP calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::provider::*;
use piata_core::{PiataError, Result};

/// A mock LLM provider that returns pre-configured responses.
///
/// # Example
/// ```
/// use piata_llm::mock::MockProvider;
/// let provider = MockProvider::new("test")
///     .with_response("Hello, world!");
/// ```
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Track all requests received (for assertions in tests).
    pub requests: Arc<Mutex<Vec<LlmRequest>>>,
    /// Returned once the queue is empty. `None` yields a placeholder text.
    when_exhausted: Option<String>,
    name: String,
}

/// A pre-configured response from the mock provider.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub text: String,
    pub stop_reason: StopReason,
    pub usage: Usage,
    /// If set, the provider will return this error instead.
    pub error: Option<String>,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            text: String::new(),
            stop_reason: StopReason::EndTurn,
            usage: Usage {
                input_tokens: 100,
                output_tokens: 50,
            },
            error: None,
        }
    }
}

impl MockResponse {
    /// Create a text response.
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    /// Create an error response.
    pub fn error(msg: &str) -> Self {
        Self {
            error: Some(msg.to_string()),
            ..Default::default()
        }
    }
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(vec![])),
            when_exhausted: None,
            name: name.into(),
        }
    }

    /// A provider that fails every call with `error`.
    pub fn unavailable(name: impl Into<String>, error: &str) -> Self {
        Self {
            when_exhausted: Some(error.to_string()),
            ..Self::new(name)
        }
    }

    /// Queue a simple text response.
    pub fn with_response(self, text: &str) -> Self {
        self.responses.lock().push_back(MockResponse::text(text));
        self
    }

    /// Queue a JSON reply, as a structured-output call would receive it.
    pub fn with_json(self, value: serde_json::Value) -> Self {
        self.responses
            .lock()
            .push_back(MockResponse::text(&value.to_string()));
        self
    }

    /// Queue an error response.
    pub fn with_error(self, error: &str) -> Self {
        self.responses.lock().push_back(MockResponse::error(error));
        self
    }

    /// Queue a fully custom response.
    pub fn with_mock_response(self, resp: MockResponse) -> Self {
        self.responses.lock().push_back(resp);
        self
    }

    /// Get all requests that were made to this provider.
    pub fn recorded_requests(&self) -> Arc<Mutex<Vec<LlmRequest>>> {
        Arc::clone(&self.requests)
    }

    /// Queue a response directly (for mutable access patterns).
    pub fn queue_response(&mut self, resp: MockResponse) {
        self.responses.lock().push_back(resp);
    }

    /// Pop the next queued response, or fall back to the exhausted behaviour.
    fn next_response(&self) -> MockResponse {
        match self.responses.lock().pop_front() {
            Some(resp) => resp,
            None => match self.when_exhausted {
                Some(ref error) => MockResponse::error(error),
                None => MockResponse::text("(mock: no more queued responses)"),
            },
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().push(request.clone());
        let mock = self.next_response();

        if let Some(error) = mock.error {
            return Err(PiataError::LlmProvider(error));
        }

        Ok(LlmResponse {
            text: mock.text,
            usage: mock.usage,
            stop_reason: mock.stop_reason,
        })
    }

    async fn health_check(&self) -> Result<()> {
        match self.when_exhausted {
            Some(ref error) => Err(PiataError::LlmProvider(error.clone())),
            None => Ok(()),
        }
    }
}
