use piata_core::{ServerKind, ToolServer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Root configuration, maps to `piata.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PiataConfig {
    pub llm: LlmConfig,
    pub executor: ExecutorConfig,
    pub synthesis: SynthesisConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    /// Tool-servers reachable by the orchestrator. Replaces the built-in
    /// catalogue entirely when present.
    pub servers: Vec<ToolServer>,
}

// ── LLM ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider adapter: "openai" (any OpenAI-compatible endpoint) or "mock".
    pub provider: String,
    /// Model identifier sent to the provider, e.g. "gpt-4o-mini".
    pub model: String,
    /// Base URL of the chat-completions API.
    pub base_url: String,
    /// API key. Falls back to OPENAI_API_KEY when unset.
    pub api_key: Option<String>,
    /// Sampling temperature (0.0 - 2.0). Kept low so classification is stable.
    pub temperature: f32,
    /// Maximum tokens per completion.
    pub max_tokens: u32,
    /// HTTP timeout for a single completion request.
    pub request_timeout_secs: u64,
    /// Retries for transient provider failures (429, 5xx, timeouts).
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            temperature: 0.1,
            max_tokens: 1024,
            request_timeout_secs: 60,
            max_retries: 2,
        }
    }
}

// ── Executor ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Hard timeout per tool call.
    pub timeout_secs: u64,
    /// Run a request's tool calls concurrently. Result order is preserved either way.
    pub parallel: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            parallel: false,
        }
    }
}

// ── Synthesis ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Number of most recent history messages included in the reply prompt.
    pub history_window: usize,
    /// Tool payload JSON longer than this is truncated in the prompt. 0 disables truncation.
    pub max_payload_chars: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            history_window: 6,
            max_payload_chars: 4000,
        }
    }
}

// ── Store ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Conversation store backend: "sqlite" or "memory".
    pub backend: String,
    /// Path to the SQLite database (sqlite backend only).
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".into(),
            db_path: PathBuf::from("conversations.db"),
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Default for root ───────────────────────────────────────────

impl Default for PiataConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            executor: ExecutorConfig::default(),
            synthesis: SynthesisConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
            servers: default_servers(),
        }
    }
}

/// The marketplace's built-in tool-server catalogue.
pub fn default_servers() -> Vec<ToolServer> {
    fn server(kind: &str, name: &str, port: u16, description: &str, tools: &[&str]) -> ToolServer {
        ToolServer {
            kind: ServerKind::new(kind),
            name: name.into(),
            base_url: format!("http://localhost:{port}"),
            description: description.into(),
            tools: tools.iter().map(|t| t.to_string()).collect(),
        }
    }

    vec![
        server(
            ServerKind::ADVERTISING,
            "Advertising Server",
            8001,
            "Marketing optimisation, pricing, content generation",
            &[
                "optimize_listing_title",
                "optimize_description",
                "suggest_pricing",
                "generate_marketing_content",
                "analyze_competition",
            ],
        ),
        server(
            ServerKind::DATABASE,
            "Database Server",
            8002,
            "User management, listings, SQL-style queries",
            &[
                "search_listings",
                "get_listing_details",
                "get_user_stats",
                "get_platform_stats",
                "create_listing",
                "execute_query",
            ],
        ),
        server(
            ServerKind::STOCK,
            "Stock Server",
            8003,
            "Inventory, stock, supply chain",
            &[
                "forecast_demand",
                "check_inventory",
                "analyze_suppliers",
                "restock_recommendations",
            ],
        ),
    ]
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

/// Upper bound for `llm.max_retries`.
pub const MAX_LLM_RETRIES: u32 = 10;

impl PiataConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let warnings = self.diagnostics();

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }

    /// Every finding, whatever its severity.
    pub fn diagnostics(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        // ── LLM provider ───
        let valid_providers = ["openai", "mock"];
        if !valid_providers.contains(&self.llm.provider.as_str()) {
            warnings.push(ConfigWarning {
                field: "llm.provider".into(),
                message: format!("unknown provider '{}'", self.llm.provider),
                severity: WarningSeverity::Error,
                hint: Some(format!("Valid values: {}", valid_providers.join(", "))),
            });
        }

        if self.llm.model.is_empty() {
            warnings.push(ConfigWarning {
                field: "llm.model".into(),
                message: "model is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'gpt-4o-mini'".into()),
            });
        }

        if self.llm.provider == "openai" && self.llm.api_key.is_none() {
            warnings.push(ConfigWarning {
                field: "llm.api_key".into(),
                message: "no API key configured — every LLM call will fail and the orchestrator will run on fallbacks".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set llm.api_key in piata.toml or export OPENAI_API_KEY".into()),
            });
        }

        // ── Temperature ───
        if self.llm.temperature < 0.0 || self.llm.temperature > 2.0 {
            warnings.push(ConfigWarning {
                field: "llm.temperature".into(),
                message: format!("temperature {} is out of range", self.llm.temperature),
                severity: WarningSeverity::Error,
                hint: Some("Temperature must be between 0.0 and 2.0".into()),
            });
        } else if self.llm.temperature > 0.7 {
            warnings.push(ConfigWarning {
                field: "llm.temperature".into(),
                message: format!("temperature {} is high for intent classification", self.llm.temperature),
                severity: WarningSeverity::Info,
                hint: Some("Values around 0.1 keep structured output stable".into()),
            });
        }

        // ── Max tokens ───
        if self.llm.max_tokens == 0 {
            warnings.push(ConfigWarning {
                field: "llm.max_tokens".into(),
                message: "max_tokens is 0 — the model won't produce output".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 1024".into()),
            });
        }

        if self.llm.request_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "llm.request_timeout_secs".into(),
                message: "LLM request timeout is 0, every call would time out".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 60".into()),
            });
        }

        if self.llm.max_retries > MAX_LLM_RETRIES {
            warnings.push(ConfigWarning {
                field: "llm.max_retries".into(),
                message: format!(
                    "max_retries {} exceeds the limit of {MAX_LLM_RETRIES}",
                    self.llm.max_retries
                ),
                severity: WarningSeverity::Error,
                hint: Some("Backoff doubles per retry; 2 or 3 is plenty".into()),
            });
        }

        // ── Executor ───
        if self.executor.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "executor.timeout_secs".into(),
                message: "tool call timeout is 0".into(),
                severity: WarningSeverity::Error,
                hint: Some("The tool-server contract expects 30 seconds".into()),
            });
        }

        // ── Servers ───
        if self.servers.is_empty() {
            warnings.push(ConfigWarning {
                field: "servers".into(),
                message: "no tool-servers configured — every request will be answered as general".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Remove the empty [[servers]] list to use the built-in catalogue".into()),
            });
        }
        let mut seen = HashSet::new();
        for (i, server) in self.servers.iter().enumerate() {
            if !seen.insert(server.kind.clone()) {
                warnings.push(ConfigWarning {
                    field: format!("servers[{i}].kind"),
                    message: format!("duplicate server kind '{}'", server.kind),
                    severity: WarningSeverity::Error,
                    hint: Some("Each kind may appear only once".into()),
                });
            }
            if !(server.base_url.starts_with("http://") || server.base_url.starts_with("https://")) {
                warnings.push(ConfigWarning {
                    field: format!("servers[{i}].base_url"),
                    message: format!("'{}' is not an http(s) URL", server.base_url),
                    severity: WarningSeverity::Error,
                    hint: Some("e.g. 'http://localhost:8002'".into()),
                });
            }
            if server.tools.is_empty() {
                warnings.push(ConfigWarning {
                    field: format!("servers[{i}].tools"),
                    message: format!("server '{}' advertises no tools — requests for it get an empty plan", server.kind),
                    severity: WarningSeverity::Warning,
                    hint: None,
                });
            }
        }

        // ── Store ───
        let valid_backends = ["sqlite", "memory"];
        if !valid_backends.contains(&self.store.backend.as_str()) {
            warnings.push(ConfigWarning {
                field: "store.backend".into(),
                message: format!("unknown store backend '{}'", self.store.backend),
                severity: WarningSeverity::Error,
                hint: Some(format!("Valid values: {}", valid_backends.join(", "))),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        warnings
    }
}
