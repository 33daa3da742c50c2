use thiserror::Error;

/// Unified error type for the orchestrator and its host layer.
#[derive(Error, Debug)]
pub enum PiataError {
    // ── LLM errors ─────────────────────────────────────────────
    #[error("llm provider error: {0}")]
    LlmProvider(String),

    #[error("llm rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("structured output error: {0}")]
    StructuredOutput(String),

    #[error("synthesis failed: {0}")]
    Synthesis(String),

    // ── Tool errors ────────────────────────────────────────────
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool transport failed: {tool}: {reason}")]
    ToolTransport { tool: String, reason: String },

    // ── Request errors ─────────────────────────────────────────
    #[error("utterance is empty")]
    EmptyUtterance,

    #[error("request cancelled")]
    Cancelled,

    // ── Conversation store errors ──────────────────────────────
    #[error("conversation store error: {0}")]
    Store(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PiataError>;
