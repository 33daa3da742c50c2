use std::fmt::Write as _;

use piata_core::{Message, PiataError, RequestIntent, ToolOutcome, ToolResult};
use piata_llm::{LlmGateway, Prompt};
use tracing::warn;

const SYSTEM_PROMPT: &str = "You are the assistant of Piata.ro, a Romanian online marketplace.\n\
Write the reply the user will read, based on the tool results below.\n\
- Be concise and friendly.\n\
- Mention concrete results (listings, prices, numbers) when the tools returned them.\n\
- If a tool failed, say which kind of information is unavailable right now, without tool names or internal identifiers.\n\
- If no tools were used, answer directly and offer help with listings, advertising or stock.";

/// Produces the user-facing reply from tool results. Never fails.
pub struct ResponseSynthesiser {
    gateway: LlmGateway,
    history_window: usize,
    max_payload_chars: usize,
}

impl ResponseSynthesiser {
    pub fn new(gateway: LlmGateway) -> Self {
        Self {
            gateway,
            history_window: 6,
            max_payload_chars: 4000,
        }
    }

    /// Number of most recent history messages given to the model.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Truncate payload JSON beyond this many characters. 0 disables truncation.
    pub fn with_max_payload_chars(mut self, max: usize) -> Self {
        self.max_payload_chars = max;
        self
    }

    pub async fn synthesise(
        &self,
        utterance: &str,
        intent: &RequestIntent,
        results: &[ToolResult],
        history: &[Message],
    ) -> String {
        let prompt = self.build_prompt(utterance, intent, results, history);
        match self.gateway.complete_text("synthesise_reply", &prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                let err = PiataError::Synthesis(e.to_string());
                warn!(error = %err, "returning apology");
                apology(&err)
            }
        }
    }

    pub fn build_prompt(
        &self,
        utterance: &str,
        intent: &RequestIntent,
        results: &[ToolResult],
        history: &[Message],
    ) -> Prompt {
        let server = intent
            .server_needed
            .as_ref()
            .map(|k| k.as_str())
            .unwrap_or("none");

        let mut user = format!(
            "User request: {utterance}\nIntent reasoning: {}\nTarget server: {server}\n",
            intent.reasoning
        );
        if results.is_empty() {
            user.push_str("Tool results: none\n");
        } else {
            user.push_str("Tool results:\n");
            user.push_str(&render_results(results, self.max_payload_chars));
        }

        let start = history.len().saturating_sub(self.history_window);
        Prompt::new(SYSTEM_PROMPT, user).with_history(history[start..].to_vec())
    }
}

/// One line per result: `✅ ref: payload` or `❌ ref: error`.
pub fn render_results(results: &[ToolResult], max_payload_chars: usize) -> String {
    let mut out = String::new();
    for result in results {
        let _ = match result.outcome {
            ToolOutcome::Success { ref payload } => writeln!(
                out,
                "✅ {}: {}",
                result.tool_ref,
                truncate(&payload.to_string(), max_payload_chars)
            ),
            ToolOutcome::Failure { ref error } => {
                writeln!(out, "❌ {}: {error}", result.tool_ref)
            }
        };
    }
    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!("{kept}… [truncated]")
}

/// The reply used when the model could not write one.
pub fn apology(error: &impl std::fmt::Display) -> String {
    format!(
        "I'm sorry, I couldn't generate a complete answer right now ({error}). Please try again in a moment."
    )
}
