use std::fmt::Write as _;
use std::sync::Arc;

use piata_core::{IntentType, PiataError, RequestIntent, Result, ServerKind};
use piata_llm::{LlmGateway, Prompt};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::registry::ToolServerRegistry;

const DATABASE_KEYWORDS: &[&str] = &[
    "user", "database", "sql", "query", "listing", "search", "stats", "create",
];
const ADVERTISING_KEYWORDS: &[&str] = &[
    "optimize",
    "marketing",
    "price",
    "pricing",
    "title",
    "description",
    "promote",
];
const STOCK_KEYWORDS: &[&str] = &["inventory", "stock", "supply", "forecast", "supplier"];

/// Checked in this order; the first set with a hit wins.
const KEYWORD_SETS: &[(IntentType, &[&str])] = &[
    (IntentType::Database, DATABASE_KEYWORDS),
    (IntentType::Advertising, ADVERTISING_KEYWORDS),
    (IntentType::Stock, STOCK_KEYWORDS),
];

const KEYWORD_CONFIDENCE: f32 = 0.7;
const GENERAL_CONFIDENCE: f32 = 0.5;

/// The intent object the model is asked to produce.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct IntentDraft {
    /// One of database, advertising, stock, general.
    pub intent_type: IntentType,
    /// Between 0.0 and 1.0.
    pub confidence: f32,
    /// Tool names that look relevant, most relevant first.
    #[serde(default)]
    pub required_tools: Vec<String>,
    /// Server kind that should handle the request, or null for general requests.
    #[serde(default)]
    pub server_needed: Option<String>,
    /// One sentence explaining the decision.
    #[serde(default)]
    pub reasoning: String,
}

/// Deterministic keyword classification of an utterance.
///
/// Used whenever the model cannot be reached or answers with something
/// unusable. The same input always yields the same intent.
pub fn keyword_intent(utterance: &str) -> RequestIntent {
    let lowered = utterance.to_lowercase();
    for (intent_type, keywords) in KEYWORD_SETS {
        if let Some(keyword) = keywords.iter().find(|k| lowered.contains(**k)) {
            return RequestIntent {
                intent_type: *intent_type,
                confidence: KEYWORD_CONFIDENCE,
                required_tools: vec![],
                server_needed: intent_type.default_server(),
                reasoning: format!("keyword fallback: matched '{keyword}'"),
            };
        }
    }
    RequestIntent::general(GENERAL_CONFIDENCE, "keyword fallback: no keyword matched")
}

/// Maps an utterance to a [`RequestIntent`]. Never fails.
pub struct IntentClassifier {
    gateway: LlmGateway,
    registry: Arc<ToolServerRegistry>,
}

impl IntentClassifier {
    pub fn new(gateway: LlmGateway, registry: Arc<ToolServerRegistry>) -> Self {
        Self { gateway, registry }
    }

    pub async fn classify(&self, utterance: &str) -> RequestIntent {
        match self.classify_with_llm(utterance).await {
            Ok(intent) => {
                debug!(
                    intent = %intent.intent_type,
                    confidence = intent.confidence,
                    server = ?intent.server_needed,
                    "classified request"
                );
                intent
            }
            Err(e) => {
                warn!(error = %e, "intent classification failed, using keyword fallback");
                self.fallback(utterance)
            }
        }
    }

    async fn classify_with_llm(&self, utterance: &str) -> Result<RequestIntent> {
        let prompt = Prompt::new(self.system_prompt(), format!("User request: {utterance}"));
        let draft: IntentDraft = self
            .gateway
            .complete_structured("classify_intent", &prompt)
            .await?;
        self.validate(draft)
    }

    /// Keyword intent, downgraded to general when the matched server is not registered.
    fn fallback(&self, utterance: &str) -> RequestIntent {
        let intent = keyword_intent(utterance);
        match intent.server_needed {
            Some(ref kind) if !self.registry.contains(kind.as_str()) => {
                RequestIntent::general(
                    GENERAL_CONFIDENCE,
                    format!("keyword fallback: server '{kind}' is not available"),
                )
            }
            _ => intent,
        }
    }

    /// Check a draft against the registry and normalise it.
    pub fn validate(&self, draft: IntentDraft) -> Result<RequestIntent> {
        if !(0.0..=1.0).contains(&draft.confidence) {
            return Err(PiataError::StructuredOutput(format!(
                "confidence {} outside [0, 1]",
                draft.confidence
            )));
        }

        if draft.intent_type == IntentType::General {
            return Ok(RequestIntent {
                intent_type: IntentType::General,
                confidence: draft.confidence,
                required_tools: draft.required_tools,
                server_needed: None,
                reasoning: draft.reasoning,
            });
        }

        let requested = draft
            .server_needed
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty() && s != "none" && s != "null");

        let server_needed = match requested {
            Some(kind) if self.registry.contains(&kind) => Some(ServerKind::new(kind)),
            Some(kind) => {
                return Err(PiataError::StructuredOutput(format!(
                    "server_needed '{kind}' is not a registered tool-server"
                )));
            }
            None => draft
                .intent_type
                .default_server()
                .filter(|k| self.registry.contains(k.as_str())),
        };

        Ok(RequestIntent {
            intent_type: draft.intent_type,
            confidence: draft.confidence,
            required_tools: draft.required_tools,
            server_needed,
            reasoning: draft.reasoning,
        })
    }

    fn system_prompt(&self) -> String {
        let mut prompt = String::from(
            "You route requests for the Piata.ro marketplace assistant to the right tool-server.\n\nAvailable servers:\n",
        );
        for server in self.registry.list_servers() {
            let _ = writeln!(
                prompt,
                "- {} ({}): {}. Tools: {}",
                server.kind,
                server.name,
                server.description,
                server.tools.join(", ")
            );
        }
        let kinds: Vec<&str> = IntentType::ALL.iter().map(|t| t.as_str()).collect();
        let _ = write!(
            prompt,
            "\nAllowed intent_type values: {}.\n\
             Use \"general\" with server_needed null for greetings, small talk, or anything no server handles.\n\
             Otherwise set server_needed to the kind of the server that should handle the request.\n\
             Reply with an object with the fields intent_type, confidence, required_tools, server_needed and reasoning.",
            kinds.join(", ")
        );
        prompt
    }
}
