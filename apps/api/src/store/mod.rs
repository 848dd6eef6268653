//! Storage plumbing shared by the note and chat repositories.
//!
//! Two backends exist for every collection: the remote Postgres store (the
//! source of truth for multi-client consistency) and a durable local
//! key/value store used whenever the remote one is unreachable or rejects a
//! write. Everything here classifies failures so callers can decide between
//! narrowing a payload, falling back locally, or giving up.

pub mod kv;
pub mod payload;

use thiserror::Error;

/// Postgres SQLSTATE for `undefined_column`.
const UNDEFINED_COLUMN: &str = "42703";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Remote store is not configured")]
    NotConfigured,

    #[error("Column missing on remote store: {0}")]
    MissingColumn(String),

    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Remote store rejected the operation: {0}")]
    Rejected(String),

    #[error("Local store I/O error: {0}")]
    Local(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    /// True when the backend refused the statement because of its shape
    /// (an optional column not yet provisioned), not because it is down.
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, StoreError::MissingColumn(_))
    }

    /// Name of the missing column, when this is a schema mismatch.
    pub fn missing_column(&self) -> Option<&str> {
        match self {
            StoreError::MissingColumn(column) => Some(column),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                let message = db.message().to_string();
                match db.code().as_deref() {
                    Some(UNDEFINED_COLUMN) => {
                        StoreError::MissingColumn(column_from_message(&message))
                    }
                    _ => StoreError::Rejected(message),
                }
            }
            sqlx::Error::ColumnNotFound(column) => StoreError::MissingColumn(column.clone()),
            sqlx::Error::Configuration(_)
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Rejected(err.to_string()),
        }
    }
}

/// Extracts the column name from a Postgres undefined-column message such as
/// `column "deleted_at" does not exist` or
/// `column "shared_to_plc_id" of relation "notes" does not exist`.
/// Falls back to the whole message when no quoted name is present.
fn column_from_message(message: &str) -> String {
    message
        .split('"')
        .nth(1)
        .filter(|name| !name.is_empty())
        .unwrap_or(message)
        .to_string()
}
