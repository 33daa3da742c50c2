//! Observability seam for LLM calls.
//!
//! Every gateway call produces one [`LlmTrace`]. Where it goes is up to the
//! installed [`TraceSink`]; the default discards it.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::provider::Usage;

/// Record of one completed (or failed) LLM call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmTrace {
    /// `"<operation>-<uuid>"`.
    pub correlation_id: String,
    /// Logical operation, e.g. "classify_intent".
    pub operation: String,
    pub model: String,
    pub latency_ms: u64,
    /// Number of provider attempts, including retries.
    pub attempts: u32,
    /// System instructions as sent, including any schema appendix.
    pub system_prompt: String,
    /// The user turn of the prompt.
    pub user_prompt: String,
    /// Characters of prompt text sent (system + messages).
    pub prompt_chars: usize,
    pub usage: Usage,
    pub outcome: TraceOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum TraceOutcome {
    Ok,
    Error(String),
}

/// Receives a record for every LLM call. Must be cheap and non-blocking.
pub trait TraceSink: Send + Sync {
    fn record(&self, trace: &LlmTrace);
}

/// Discards every trace.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {
    fn record(&self, _trace: &LlmTrace) {}
}

/// Emits each trace as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn record(&self, trace: &LlmTrace) {
        match trace.outcome {
            TraceOutcome::Ok => info!(
                correlation_id = %trace.correlation_id,
                operation = %trace.operation,
                model = %trace.model,
                latency_ms = trace.latency_ms,
                attempts = trace.attempts,
                prompt_chars = trace.prompt_chars,
                input_tokens = trace.usage.input_tokens,
                output_tokens = trace.usage.output_tokens,
                total_tokens = trace.usage.total_tokens(),
                "llm call completed"
            ),
            TraceOutcome::Error(ref error) => warn!(
                correlation_id = %trace.correlation_id,
                operation = %trace.operation,
                model = %trace.model,
                latency_ms = trace.latency_ms,
                attempts = trace.attempts,
                error = %error,
                "llm call failed"
            ),
        }
    }
}

/// Keeps every trace in memory. Useful for tests and debugging commands.
#[derive(Debug, Default)]
pub struct MemoryTraceSink {
    traces: Mutex<Vec<LlmTrace>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traces(&self) -> Vec<LlmTrace> {
        self.traces.lock().clone()
    }
}

impl TraceSink for MemoryTraceSink {
    fn record(&self, trace: &LlmTrace) {
        self.traces.lock().push(trace.clone());
    }
}
