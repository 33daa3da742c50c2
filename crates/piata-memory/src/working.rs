use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use piata_core::{Conversation, ConversationId, ConversationStore, Message, PiataError, Result};
use uuid::Uuid;

/// Conversation store held in RAM. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<ConversationId, ConversationLog>>,
}

struct ConversationLog {
    conversation: Conversation,
    messages: Vec<Message>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.lock().len()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get_or_create(
        &self,
        user_id: &str,
        key: Option<ConversationId>,
        title_hint: &str,
    ) -> Result<Conversation> {
        let mut conversations = self.conversations.lock();
        if let Some(id) = key
            && let Some(log) = conversations.get(&id)
        {
            if log.conversation.user_id != user_id {
                return Err(PiataError::Store(format!(
                    "conversation {id} belongs to another user"
                )));
            }
            return Ok(log.conversation.clone());
        }

        let conversation = Conversation::new(key.unwrap_or_else(Uuid::new_v4), user_id, title_hint);
        conversations.insert(
            conversation.id,
            ConversationLog {
                conversation: conversation.clone(),
                messages: Vec::new(),
            },
        );
        Ok(conversation)
    }

    async fn append(&self, conversation: &Conversation, message: Message) -> Result<()> {
        let mut conversations = self.conversations.lock();
        let log = conversations
            .get_mut(&conversation.id)
            .ok_or_else(|| PiataError::Store(format!("unknown conversation {}", conversation.id)))?;
        log.messages.push(message);
        Ok(())
    }

    async fn history(
        &self,
        conversation: &Conversation,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>> {
        let conversations = self.conversations.lock();
        let Some(log) = conversations.get(&conversation.id) else {
            return Ok(Vec::new());
        };
        let mut messages: Vec<Message> = log
            .messages
            .iter()
            .filter(|m| before.is_none_or(|b| m.timestamp < b))
            .cloned()
            .collect();
        // Stable, so equal timestamps keep append order.
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }
}
