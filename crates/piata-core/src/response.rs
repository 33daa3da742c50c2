use serde::{Deserialize, Serialize};

use crate::intent::RequestIntent;
use crate::tool::ToolResult;

/// Reply shown to users when the whole pipeline fails.
pub const DEGRADED_REPLY: &str =
    "I'm sorry, something went wrong while handling your request. Please try again.";

/// Everything the orchestrator produced for one request.
///
/// Returned to the host, which decides what (if anything) to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorResponse {
    pub reply_text: String,
    /// Refs of successful calls, in execution order.
    pub tools_used: Vec<String>,
    /// One entry per planned call, in plan order.
    pub tool_results: Vec<ToolResult>,
    pub intent: Option<RequestIntent>,
    pub reasoning: String,
}

impl OrchestratorResponse {
    /// Assemble a response, deriving `tools_used` and `reasoning` from the parts.
    pub fn new(reply_text: String, intent: RequestIntent, tool_results: Vec<ToolResult>) -> Self {
        let tools_used = tool_results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.tool_ref.clone())
            .collect();
        let reasoning = format!(
            "Analyzed as {} with {}",
            intent.intent_type, intent.confidence
        );
        Self {
            reply_text,
            tools_used,
            tool_results,
            intent: Some(intent),
            reasoning,
        }
    }

    /// The response returned when the pipeline itself failed.
    pub fn degraded(error: impl std::fmt::Display) -> Self {
        Self {
            reply_text: DEGRADED_REPLY.to_string(),
            tools_used: vec![],
            tool_results: vec![],
            intent: None,
            reasoning: format!("Error occurred: {error}"),
        }
    }
}
