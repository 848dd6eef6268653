use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Column list for users queries.
pub const USER_COLUMNS: &str = "id::text AS id, email, full_name, role, \
    teacher_id::text AS teacher_id, is_active, last_login, password";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
    pub teacher_id: Option<String>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    /// Stored SHA-256 hex digest, or a demo plaintext.
    #[serde(skip_serializing)]
    pub password: String,
}
