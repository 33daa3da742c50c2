//! # piata-memory
//!
//! Conversation persistence for hosts of the orchestrator: an in-memory
//! store and a SQLite store behind the [`ConversationStore`] trait.

pub mod store;
pub mod working;

use std::sync::Arc;

use piata_config::StoreConfig;
use piata_core::{ConversationStore, PiataError, Result};

pub use store::SqliteConversationStore;
pub use working::InMemoryConversationStore;

/// Open the backend named in the configuration.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn ConversationStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryConversationStore::new())),
        "sqlite" => {
            if let Some(parent) = config.db_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            Ok(Arc::new(SqliteConversationStore::open(&config.db_path)?))
        }
        other => Err(PiataError::Config(format!(
            "unknown store backend '{other}'"
        ))),
    }
}
