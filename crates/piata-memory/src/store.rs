use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use piata_core::{Conversation, ConversationId, ConversationStore, Message, PiataError, Result, Role};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};
use uuid::Uuid;

/// SQLite-backed conversation store.
pub struct SqliteConversationStore {
    db: Arc<Mutex<Connection>>,
}

fn store_err(e: impl std::fmt::Display) -> PiataError {
    PiataError::Store(e.to_string())
}

/// Fixed-width RFC 3339 so that text order equals time order.
fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(store_err)
}

fn parse_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(store_err)
}

impl SqliteConversationStore {
    /// Open or create the conversation database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        info!(?path, "opening conversation store");

        let conn = Connection::open(path).map_err(store_err)?;

        // Enable WAL mode for concurrent reads
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(store_err)?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                tools_used TEXT NOT NULL DEFAULT '[]',
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id);
            CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, timestamp);
            ",
        )
        .map_err(store_err)?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    fn find(db: &Connection, id: &ConversationId) -> Result<Option<Conversation>> {
        let row = db
            .query_row(
                "SELECT user_id, title, created_at FROM conversations WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(store_err)?;

        match row {
            Some((user_id, title, created_at)) => Ok(Some(Conversation {
                id: *id,
                user_id,
                title,
                created_at: parse_ts(&created_at)?,
            })),
            None => Ok(None),
        }
    }

    fn insert(db: &Connection, conversation: &Conversation) -> Result<()> {
        db.execute(
            "INSERT INTO conversations (id, user_id, title, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                conversation.id.to_string(),
                conversation.user_id,
                conversation.title,
                ts(&conversation.created_at),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// Conversations of a user, newest first.
    pub fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(
                "SELECT id, title, created_at FROM conversations
                 WHERE user_id = ?1 ORDER BY created_at DESC",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(store_err)?;

        let mut out = Vec::new();
        for row in rows {
            let (id, title, created_at) = row.map_err(store_err)?;
            out.push(Conversation {
                id: parse_id(&id)?,
                user_id: user_id.to_string(),
                title,
                created_at: parse_ts(&created_at)?,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn get_or_create(
        &self,
        user_id: &str,
        key: Option<ConversationId>,
        title_hint: &str,
    ) -> Result<Conversation> {
        // Lookup and insert under one lock.
        let db = self.db.lock();
        if let Some(id) = key
            && let Some(existing) = Self::find(&db, &id)?
        {
            if existing.user_id != user_id {
                return Err(PiataError::Store(format!(
                    "conversation {id} belongs to another user"
                )));
            }
            return Ok(existing);
        }

        let conversation = Conversation::new(key.unwrap_or_else(Uuid::new_v4), user_id, title_hint);
        Self::insert(&db, &conversation)?;
        debug!(conversation = %conversation.id, user = user_id, "created conversation");
        Ok(conversation)
    }

    async fn append(&self, conversation: &Conversation, message: Message) -> Result<()> {
        let tools_used = serde_json::to_string(&message.tools_used)?;
        let db = self.db.lock();
        if Self::find(&db, &conversation.id)?.is_none() {
            return Err(PiataError::Store(format!(
                "unknown conversation {}",
                conversation.id
            )));
        }
        db.execute(
            "INSERT INTO messages (id, conversation_id, role, content, tools_used, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id.to_string(),
                conversation.id.to_string(),
                message.role.as_str(),
                message.content,
                tools_used,
                ts(&message.timestamp),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn history(
        &self,
        conversation: &Conversation,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(
                "SELECT id, role, content, tools_used, timestamp FROM messages
                 WHERE conversation_id = ?1 AND (?2 IS NULL OR timestamp < ?2)
                 ORDER BY timestamp ASC, seq ASC",
            )
            .map_err(store_err)?;

        let rows = stmt
            .query_map(
                params![conversation.id.to_string(), before.as_ref().map(ts)],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .map_err(store_err)?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, role, content, tools_used, timestamp) = row.map_err(store_err)?;
            messages.push(Message {
                id: parse_id(&id)?,
                role: role.parse::<Role>()?,
                content,
                timestamp: parse_ts(&timestamp)?,
                tools_used: serde_json::from_str(&tools_used)?,
            });
        }
        Ok(messages)
    }
}
