use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::debug;

use crate::chat::models::{ChatMessage, OutgoingMessage};
use crate::models::chat::{ChatMessageRow, CHAT_COLUMNS};
use crate::store::kv::{load_json, load_json_for_update, save_json, KeyValueStore};
use crate::store::StoreError;

pub const CHAT_KEY_PREFIX: &str = "plc_chat_";

/// One backend holding chat messages.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Messages of one group, oldest first.
    async fn list(&self, group_id: &str) -> Result<Vec<ChatMessage>, StoreError>;

    async fn append(&self, message: &OutgoingMessage) -> Result<ChatMessage, StoreError>;
}

pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn list(&self, group_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let rows: Vec<ChatMessageRow> = sqlx::query_as(&format!(
            "SELECT {CHAT_COLUMNS} FROM plc_chat_messages \
             WHERE plc_id::text = $1 ORDER BY created_at ASC"
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }

    async fn append(&self, message: &OutgoingMessage) -> Result<ChatMessage, StoreError> {
        let row: ChatMessageRow = sqlx::query_as(&format!(
            "INSERT INTO plc_chat_messages (plc_id, sender_id, sender_name, body) \
             VALUES ($1, $2, $3, $4) RETURNING {CHAT_COLUMNS}"
        ))
        .bind(&message.group_id)
        .bind(&message.sender_id)
        .bind(&message.sender_name)
        .bind(&message.body)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }
}

/// Client-side id for a message the remote store never saw:
/// `msg-<unix millis>-<7 random chars>`.
pub fn new_message_id() -> String {
    let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(7).collect();
    format!("msg-{}-{suffix}", Utc::now().timestamp_millis())
}

/// One JSON blob per group under `plc_chat_<group>`. Appends are
/// serialised across clones.
#[derive(Clone)]
pub struct LocalChatStore {
    kv: Arc<dyn KeyValueStore>,
    writer: Arc<Mutex<()>>,
}

impl LocalChatStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            writer: Arc::new(Mutex::new(())),
        }
    }

    fn key(group_id: &str) -> String {
        format!("{CHAT_KEY_PREFIX}{group_id}")
    }

    pub fn load(&self, group_id: &str) -> Vec<ChatMessage> {
        load_json(self.kv.as_ref(), &Self::key(group_id))
    }
}

#[async_trait]
impl ChatStore for LocalChatStore {
    async fn list(&self, group_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let mut messages = self.load(group_id);
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn append(&self, message: &OutgoingMessage) -> Result<ChatMessage, StoreError> {
        let stored = ChatMessage {
            id: new_message_id(),
            group_id: message.group_id.clone(),
            sender_id: message.sender_id.clone(),
            sender_name: message.sender_name.clone(),
            body: message.body.clone(),
            created_at: Utc::now(),
        };
        {
            let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
            let key = Self::key(&message.group_id);
            let mut messages: Vec<ChatMessage> = load_json_for_update(self.kv.as_ref(), &key)?;
            messages.push(stored.clone());
            save_json(self.kv.as_ref(), &key, &messages)?;
        }
        debug!("Chat message {} stored locally", stored.id);
        Ok(stored)
    }
}
