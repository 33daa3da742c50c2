use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key of a tool-server in the registry, e.g. "database".
///
/// Kinds are open-ended so that configuration can add servers beyond the
/// three the marketplace ships with.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerKind(String);

impl ServerKind {
    pub const ADVERTISING: &'static str = "advertising";
    pub const DATABASE: &'static str = "database";
    pub const STOCK: &'static str = "stock";

    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerKind {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ServerKind {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for ServerKind {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ServerKind {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A remote tool-server reachable over the MCP `/call` contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolServer {
    pub kind: ServerKind,
    /// Human-readable name, e.g. "Database Server".
    pub name: String,
    /// Base URL without the `/call` suffix.
    pub base_url: String,
    pub description: String,
    /// Advertised tool names, in the order the server lists them.
    #[serde(default)]
    pub tools: Vec<String>,
}

impl ToolServer {
    pub fn has_tool(&self, tool_name: &str) -> bool {
        self.tools.iter().any(|t| t == tool_name)
    }

    /// The `/call` endpoint for this server.
    pub fn call_url(&self) -> String {
        format!("{}/call", self.base_url.trim_end_matches('/'))
    }
}

/// A `(server, tool)` pair known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub server: ServerKind,
    pub tool_name: String,
}

impl ToolDescriptor {
    pub fn tool_ref(&self) -> String {
        tool_ref(&self.server, &self.tool_name)
    }
}

/// Render the `server_kind.tool_name` reference used in results and history.
pub fn tool_ref(server: &ServerKind, tool_name: &str) -> String {
    format!("{server}.{tool_name}")
}

/// A planned invocation of one tool on one server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub server: ServerKind,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// What the planner expects this call to produce.
    #[serde(default)]
    pub expected_result: String,
}

impl ToolCall {
    pub fn new(server: ServerKind, tool_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            server,
            tool_name: tool_name.into(),
            arguments,
            expected_result: String::new(),
        }
    }

    pub fn with_expected_result(mut self, expected: impl Into<String>) -> Self {
        self.expected_result = expected.into();
        self
    }

    pub fn tool_ref(&self) -> String {
        tool_ref(&self.server, &self.tool_name)
    }

    /// Stable request id: the tool name plus a hash of the canonical arguments.
    /// Identical calls always produce the same id.
    pub fn correlation_id(&self) -> String {
        let mut canonical = String::new();
        write_canonical(&Value::Object(self.arguments.clone()), &mut canonical);
        let hash = blake3::hash(canonical.as_bytes()).to_hex();
        format!("{}-{}", self.tool_name, &hash.as_str()[..16])
    }
}

/// Serialize a JSON value with object keys sorted, independent of map ordering.
///
/// `serde_json::Map` only iterates sorted while the `preserve_order` feature is
/// off, and any crate in the dependency graph can turn it on.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// The outcome of one tool call. Exactly one of payload or error exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_ref: String,
    #[serde(flatten)]
    pub outcome: ToolOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { payload: Value },
    Failure { error: String },
}

impl ToolResult {
    pub fn success(tool_ref: impl Into<String>, payload: Value) -> Self {
        Self {
            tool_ref: tool_ref.into(),
            outcome: ToolOutcome::Success { payload },
        }
    }

    pub fn failure(tool_ref: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_ref: tool_ref.into(),
            outcome: ToolOutcome::Failure {
                error: error.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success { .. })
    }

    pub fn payload(&self) -> Option<&Value> {
        match &self.outcome {
            ToolOutcome::Success { payload } => Some(payload),
            ToolOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ToolOutcome::Success { .. } => None,
            ToolOutcome::Failure { error } => Some(error),
        }
    }
}
