use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tool::ServerKind;

/// What kind of help a request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum IntentType {
    /// Listings, users, statistics, SQL-style queries.
    Database,
    /// Titles, descriptions, pricing, promotion.
    Advertising,
    /// Inventory, supply, demand forecasts.
    Stock,
    /// Small talk or anything no tool-server handles.
    General,
}

impl IntentType {
    pub const ALL: [IntentType; 4] = [
        IntentType::Database,
        IntentType::Advertising,
        IntentType::Stock,
        IntentType::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::Database => "database",
            IntentType::Advertising => "advertising",
            IntentType::Stock => "stock",
            IntentType::General => "general",
        }
    }

    /// The server kind conventionally handling this intent, if any.
    pub fn default_server(&self) -> Option<ServerKind> {
        match self {
            IntentType::General => None,
            other => Some(ServerKind::new(other.as_str())),
        }
    }
}

impl std::fmt::Display for IntentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The classifier's decision for one request. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestIntent {
    pub intent_type: IntentType,
    /// In `[0.0, 1.0]`.
    pub confidence: f32,
    /// Tools the classifier thinks are relevant. Advisory only.
    #[serde(default)]
    pub required_tools: Vec<String>,
    /// `None` for general intents.
    pub server_needed: Option<ServerKind>,
    pub reasoning: String,
}

impl RequestIntent {
    pub fn general(confidence: f32, reasoning: impl Into<String>) -> Self {
        Self {
            intent_type: IntentType::General,
            confidence,
            required_tools: vec![],
            server_needed: None,
            reasoning: reasoning.into(),
        }
    }

    /// Whether this intent came from the deterministic keyword path.
    pub fn is_fallback(&self) -> bool {
        self.reasoning.to_lowercase().contains("fallback")
    }
}
