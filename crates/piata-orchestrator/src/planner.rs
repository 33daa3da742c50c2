use std::sync::Arc;

use piata_core::{RequestIntent, Result, ServerKind, ToolCall, ToolServer};
use piata_llm::{LlmGateway, Prompt};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::registry::ToolServerRegistry;

/// The plan object the model is asked to produce.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PlanDraft {
    /// Tool calls to run, in order.
    #[serde(default)]
    pub calls: Vec<PlannedCall>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PlannedCall {
    /// Server kind, e.g. "database".
    pub server: String,
    /// Tool name exactly as advertised by the server.
    pub tool: String,
    /// Arguments passed to the tool.
    #[serde(default)]
    pub params: Map<String, Value>,
    /// What this call should return.
    #[serde(default)]
    pub expected_result: String,
}

/// Turns an intent and an utterance into the tool calls to run.
pub struct ToolPlanner {
    gateway: LlmGateway,
    registry: Arc<ToolServerRegistry>,
}

impl ToolPlanner {
    pub fn new(gateway: LlmGateway, registry: Arc<ToolServerRegistry>) -> Self {
        Self { gateway, registry }
    }

    /// Every returned call targets `intent.server_needed` and a tool it advertises.
    pub async fn plan(&self, intent: &RequestIntent, utterance: &str) -> Vec<ToolCall> {
        let Some(ref kind) = intent.server_needed else {
            return vec![];
        };
        let server = match self.registry.get(kind.as_str()) {
            Ok(server) => server,
            Err(e) => {
                warn!(server = %kind, error = %e, "cannot plan for unknown server");
                return vec![];
            }
        };
        if server.tools.is_empty() {
            info!(server = %kind, "server advertises no tools, nothing to plan");
            return vec![];
        }

        let calls = match self.plan_with_llm(server, intent, utterance).await {
            Ok(draft) => self.validate(draft, kind),
            Err(e) => {
                warn!(server = %kind, error = %e, "tool planning failed");
                vec![]
            }
        };

        if calls.is_empty() {
            let call = generic_call(server, utterance);
            info!(tool = %call.tool_ref(), "using generic fallback call");
            return vec![call];
        }

        debug!(
            server = %kind,
            calls = calls.len(),
            tools = ?calls.iter().map(|c| c.tool_name.as_str()).collect::<Vec<_>>(),
            "planned tool calls"
        );
        calls
    }

    async fn plan_with_llm(
        &self,
        server: &ToolServer,
        intent: &RequestIntent,
        utterance: &str,
    ) -> Result<PlanDraft> {
        let system = format!(
            "You plan tool calls for the Piata.ro marketplace assistant.\n\
             Server: {} ({}). {}\n\
             Available tools: {}\n\
             Use only these tools and set \"server\" to \"{}\" on every call.\n\
             Reply with an object {{\"calls\": [{{\"server\", \"tool\", \"params\", \"expected_result\"}}]}}.",
            server.name,
            server.kind,
            server.description,
            server.tools.join(", "),
            server.kind,
        );
        let mut user = format!(
            "Intent: {} (confidence {})\nRequest: {utterance}",
            intent.intent_type, intent.confidence
        );
        if !intent.required_tools.is_empty() {
            user.push_str(&format!(
                "\nSuggested tools: {}",
                intent.required_tools.join(", ")
            ));
        }

        self.gateway
            .complete_structured("plan_tools", &Prompt::new(system, user))
            .await
    }

    /// Keep entries naming `kind` and one of its tools, in order.
    pub fn validate(&self, draft: PlanDraft, kind: &ServerKind) -> Vec<ToolCall> {
        draft
            .calls
            .into_iter()
            .filter_map(|entry| {
                if entry.server != kind.as_str() {
                    warn!(
                        expected = %kind,
                        got = %entry.server,
                        tool = %entry.tool,
                        "dropping planned call for another server"
                    );
                    return None;
                }
                if !self.registry.has_tool(kind.as_str(), &entry.tool) {
                    warn!(server = %kind, tool = %entry.tool, "dropping planned call for unknown tool");
                    return None;
                }
                Some(
                    ToolCall::new(kind.clone(), entry.tool, entry.params)
                        .with_expected_result(entry.expected_result),
                )
            })
            .collect()
    }
}

/// One call to the server's first tool with the raw utterance as query.
fn generic_call(server: &ToolServer, utterance: &str) -> ToolCall {
    let mut params = Map::new();
    params.insert("query".into(), Value::String(utterance.to_string()));
    // Callers check that the tool list is non-empty.
    let tool = server.tools.first().cloned().unwrap_or_default();
    ToolCall::new(server.kind.clone(), tool, params)
        .with_expected_result("Relevant data for the request")
}

#[cfg(test)]
mod tests {
    use super::*;
    use piata_llm::{GatewaySettings, MockProvider};
    use serde_json::json;

    fn planner() -> ToolPlanner {
        let gateway = LlmGateway::new(Arc::new(MockProvider::new("mock")), GatewaySettings::default());
        ToolPlanner::new(gateway, Arc::new(ToolServerRegistry::defaults()))
    }

    fn entry(server: &str, tool: &str) -> PlannedCall {
        PlannedCall {
            server: server.into(),
            tool: tool.into(),
            params: Map::new(),
            expected_result: String::new(),
        }
    }

    #[test]
    fn test_validate_drops_foreign_and_unknown_entries() {
        let draft = PlanDraft {
            calls: vec![
                entry("database", "search_listings"),
                entry("stock", "forecast_demand"),
                entry("database", "drop_tables"),
                entry("database", "get_platform_stats"),
            ],
        };
        let calls = planner().validate(draft, &ServerKind::new("database"));
        let tools: Vec<&str> = calls.iter().map(|c| c.tool_name.as_str()).collect();
        assert_eq!(tools, vec!["search_listings", "get_platform_stats"]);
        assert!(calls.iter().all(|c| c.server == "database"));
    }

    #[test]
    fn test_plan_draft_accepts_missing_optional_fields() {
        let draft: PlanDraft = serde_json::from_value(json!({
            "calls": [{ "server": "stock", "tool": "check_inventory" }]
        }))
        .unwrap();
        assert_eq!(draft.calls.len(), 1);
        assert!(draft.calls[0].params.is_empty());
    }

    #[test]
    fn test_generic_call_uses_first_tool() {
        let registry = ToolServerRegistry::defaults();
        let server = registry.get("database").unwrap();
        let call = generic_call(server, "search users");
        assert_eq!(call.tool_ref(), "database.search_listings");
        assert_eq!(call.arguments["query"], "search users");
    }
}
