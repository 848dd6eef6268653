use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{Decode, Postgres, Row, Type};

/// One `notes` row as read from the remote store.
///
/// Every column except the id is optional: deployments run different schema
/// revisions (legacy `transcript`-only rows, no `shared_to_plc_id`, no
/// `deleted_at`), and a missing or undecodable column simply reads as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteRow {
    pub id: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub transcript: Option<String>,
    pub note_type: Option<String>,
    pub visibility: Option<String>,
    pub shared_to_plc_id: Option<String>,
    pub user_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
    pub source: Option<String>,
    pub ai_reflection: Option<Value>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl NoteRow {
    /// Reads a row selected as `SELECT *, id::text AS id_text FROM notes`.
    /// Returns `None` when the row has no usable id.
    pub fn from_pg(row: &PgRow) -> Option<Self> {
        let id: String = optional(row, "id_text")?;
        Some(Self {
            id,
            title: optional(row, "title"),
            content: optional(row, "content"),
            transcript: optional(row, "transcript"),
            note_type: optional(row, "type"),
            visibility: optional(row, "visibility"),
            shared_to_plc_id: text_or_number(row, "shared_to_plc_id"),
            user_id: text_or_uuid(row, "user_id"),
            created_at: optional(row, "created_at"),
            tags: optional(row, "tags"),
            source: optional(row, "source"),
            ai_reflection: optional(row, "ai_reflection"),
            deleted_at: optional(row, "deleted_at"),
        })
    }
}

fn optional<'r, T>(row: &'r PgRow, column: &str) -> Option<T>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    match row.try_get::<Option<T>, _>(column) {
        Ok(value) => value,
        Err(sqlx::Error::ColumnNotFound(_)) => None,
        Err(e) => {
            tracing::debug!("Ignoring undecodable notes.{column}: {e}");
            None
        }
    }
}

// Group references were integers on early deployments.
fn text_or_number(row: &PgRow, column: &str) -> Option<String> {
    optional::<String>(row, column).or_else(|| optional::<i64>(row, column).map(|n| n.to_string()))
}

fn text_or_uuid(row: &PgRow, column: &str) -> Option<String> {
    optional::<String>(row, column)
        .or_else(|| optional::<uuid::Uuid>(row, column).map(|id| id.to_string()))
}
