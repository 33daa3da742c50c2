use std::sync::Arc;

use piata_core::{
    Conversation, ConversationId, ConversationStore, Message, OrchestratorResponse, PiataError,
    Result,
};
use piata_orchestrator::Orchestrator;
use tracing::debug;

/// One completed exchange.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub conversation: Conversation,
    pub response: OrchestratorResponse,
}

/// Host-side glue between a conversation store and the orchestrator.
///
/// Persists the user message, runs the orchestrator with the earlier
/// history, then persists the reply together with the tools it used.
#[derive(Clone)]
pub struct ChatService {
    orchestrator: Orchestrator,
    store: Arc<dyn ConversationStore>,
}

impl ChatService {
    pub fn new(orchestrator: Orchestrator, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            orchestrator,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub async fn send(
        &self,
        user_id: &str,
        conversation: Option<ConversationId>,
        utterance: &str,
    ) -> Result<ChatTurn> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(PiataError::EmptyUtterance);
        }

        let conversation = self
            .store
            .get_or_create(user_id, conversation, utterance)
            .await?;

        let user_message = Message::user(utterance);
        let asked_at = user_message.timestamp;
        self.store.append(&conversation, user_message).await?;

        let history = self.store.history(&conversation, Some(asked_at)).await?;
        debug!(conversation = %conversation.id, history = history.len(), "running orchestrator");

        let response = self.orchestrator.process_request(utterance, &history).await;

        let reply = Message::assistant(response.reply_text.clone(), response.tools_used.clone());
        self.store.append(&conversation, reply).await?;

        Ok(ChatTurn {
            conversation,
            response,
        })
    }
}
