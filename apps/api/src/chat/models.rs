use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::chat::ChatMessageRow;

/// One message in a PLC group's channel. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub group_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessageRow> for ChatMessage {
    fn from(row: ChatMessageRow) -> Self {
        Self {
            id: row.id,
            group_id: row.plc_id,
            sender_id: row.sender_id,
            sender_name: row.sender_name,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

/// A validated message about to be sent. The body is already trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub group_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub body: String,
}

impl OutgoingMessage {
    pub fn new(
        group_id: &str,
        sender_id: &str,
        sender_name: &str,
        body: &str,
    ) -> Result<Self, AppError> {
        let group_id = group_id.trim();
        if group_id.is_empty() {
            return Err(AppError::Validation("A message needs a group".to_string()));
        }
        let body = body.trim();
        if body.is_empty() {
            return Err(AppError::Validation("Message body is empty".to_string()));
        }
        Ok(Self {
            group_id: group_id.to_string(),
            sender_id: sender_id.to_string(),
            sender_name: sender_name.to_string(),
            body: body.to_string(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub sender_id: String,
    pub sender_name: String,
    pub body: String,
}
