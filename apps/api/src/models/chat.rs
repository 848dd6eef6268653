use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Column list for plc_chat_messages queries. Ids are read as text so the
/// adapter works whether the backend uses uuid or bigint keys.
pub const CHAT_COLUMNS: &str = "id::text AS id, plc_id::text AS plc_id, \
    sender_id::text AS sender_id, sender_name, body, created_at";

/// One `plc_chat_messages` row. Also the shape of the `row` field in chat
/// change notifications.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ChatMessageRow {
    pub id: String,
    pub plc_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
