use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

/// Unique identifier for a conversation.
pub type ConversationId = Uuid;

/// Maximum length of a conversation title derived from the first message.
pub const TITLE_MAX_CHARS: usize = 50;

/// A conversation owned by the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: ConversationId, user_id: impl Into<String>, title_hint: &str) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            title: title_from_hint(title_hint),
            created_at: Utc::now(),
        }
    }
}

/// Derive a title from the first user message.
pub fn title_from_hint(hint: &str) -> String {
    let trimmed = hint.trim();
    if trimmed.is_empty() {
        return "New conversation".to_string();
    }
    trimmed.chars().take(TITLE_MAX_CHARS).collect()
}

/// Append-only message log, implemented by the host.
///
/// The orchestrator never calls this. The host appends the user message,
/// runs the orchestrator, then appends the assistant reply.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Return the conversation `(user_id, key)`, creating it when missing.
    /// `None` always creates a fresh conversation.
    async fn get_or_create(
        &self,
        user_id: &str,
        key: Option<ConversationId>,
        title_hint: &str,
    ) -> crate::Result<Conversation>;

    async fn append(&self, conversation: &Conversation, message: Message) -> crate::Result<()>;

    /// Messages in timestamp order, strictly before `before` when given.
    async fn history(
        &self,
        conversation: &Conversation,
        before: Option<DateTime<Utc>>,
    ) -> crate::Result<Vec<Message>>;
}
