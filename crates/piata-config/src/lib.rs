//! # piata-config
//!
//! Configuration system for the Piata orchestrator. Reads from `piata.toml`,
//! environment variables, and CLI overrides, in that precedence order.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::PiataConfig;
pub use schema::{
    ConfigWarning, ExecutorConfig, LlmConfig, LoggingConfig, StoreConfig, SynthesisConfig,
    WarningSeverity, default_servers,
};
