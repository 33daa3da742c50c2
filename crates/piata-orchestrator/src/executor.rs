use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use piata_core::{PiataError, Result, ToolCall, ToolResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::ToolServerRegistry;

/// Characters of an error body kept in a failure message.
const ERROR_BODY_CHARS: usize = 200;

/// The MCP `tools/call` envelope posted to a tool-server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpRequest {
    pub method: String,
    pub params: McpParams,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpParams {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl McpRequest {
    pub fn for_call(call: &ToolCall) -> Self {
        Self {
            method: "tools/call".into(),
            params: McpParams {
                name: call.tool_name.clone(),
                arguments: call.arguments.clone(),
            },
            id: call.correlation_id(),
        }
    }
}

/// How the calls of one request are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// One call at a time, in plan order.
    #[default]
    Sequential,
    /// All calls at once. Results still come back in plan order.
    Parallel,
}

/// Runs tool calls against their servers over HTTP.
///
/// Failures are recorded in the returned results, never raised, and one
/// failing call does not stop the others.
pub struct ToolExecutor {
    client: reqwest::Client,
    registry: Arc<ToolServerRegistry>,
    timeout: Duration,
    mode: ExecutionMode,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolServerRegistry>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            registry,
            timeout,
            mode: ExecutionMode::Sequential,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// One result per call, in call order.
    pub async fn execute(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        match self.mode {
            ExecutionMode::Sequential => {
                let mut results = Vec::with_capacity(calls.len());
                for call in calls {
                    results.push(self.execute_one(call).await);
                }
                results
            }
            ExecutionMode::Parallel => join_all(calls.iter().map(|c| self.execute_one(c))).await,
        }
    }

    /// Like [`execute`](Self::execute), but gives up as soon as `token` fires.
    /// The in-flight request is dropped and no further calls are started.
    pub async fn execute_cancellable(
        &self,
        calls: &[ToolCall],
        token: &CancellationToken,
    ) -> Result<Vec<ToolResult>> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(PiataError::Cancelled),
            results = self.execute(calls) => Ok(results),
        }
    }

    pub async fn execute_one(&self, call: &ToolCall) -> ToolResult {
        let tool_ref = call.tool_ref();
        let started = Instant::now();

        let result = match self.send(call).await {
            Ok(payload) => ToolResult::success(tool_ref, payload),
            Err(PiataError::ToolTransport { reason, .. }) => ToolResult::failure(tool_ref, reason),
            Err(e) => ToolResult::failure(tool_ref, format!("Unexpected error: {e}")),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result.error() {
            None => debug!(tool = %result.tool_ref, elapsed_ms, "tool call succeeded"),
            Some(error) => warn!(tool = %result.tool_ref, elapsed_ms, error = %error, "tool call failed"),
        }
        result
    }

    async fn send(&self, call: &ToolCall) -> Result<Value> {
        let server = self.registry.get(call.server.as_str())?;
        let envelope = McpRequest::for_call(call);
        let transport = |reason: String| PiataError::ToolTransport {
            tool: call.tool_ref(),
            reason,
        };

        debug!(tool = %call.tool_ref(), id = %envelope.id, url = %server.call_url(), "calling tool");

        let resp = self
            .client
            .post(server.call_url())
            .timeout(self.timeout)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    transport("Request timeout".into())
                } else if e.is_connect() || e.is_request() {
                    transport(format!("Request failed: {e}"))
                } else {
                    transport(format!("Unexpected error: {e}"))
                }
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                transport("Request timeout".into())
            } else {
                transport(format!("Unexpected error: {e}"))
            }
        })?;

        if !status.is_success() {
            let snippet: String = body.chars().take(ERROR_BODY_CHARS).collect();
            return Err(transport(format!(
                "Server returned {}: {snippet}",
                status.as_u16()
            )));
        }

        Ok(payload_from_body(body))
    }
}

/// Unwrap `{"result": ..}`, keep other JSON as is, and wrap anything else as a string.
fn payload_from_body(body: String) -> Value {
    match serde_json::from_str::<Value>(&body) {
        Ok(Value::Object(mut map)) if map.contains_key("result") => {
            map.remove("result").unwrap_or(Value::Null)
        }
        Ok(other) => other,
        Err(_) => Value::String(body),
    }
}
