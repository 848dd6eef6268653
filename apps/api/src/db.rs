use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::store::StoreError;

/// Creates a PostgreSQL connection pool without connecting. An unreachable
/// server surfaces on first use, where callers degrade to local storage.
pub fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(database_url)?;

    info!("PostgreSQL pool configured (lazy)");
    Ok(pool)
}

/// Result of a live probe against the remote store.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Reads one row from `notes` to see whether the remote store answers.
pub async fn check_connection(pool: Option<&PgPool>) -> ConnectionStatus {
    let Some(pool) = pool else {
        return ConnectionStatus {
            ok: false,
            message: "Remote store not configured; running local-only".to_string(),
            details: None,
        };
    };

    match sqlx::query("SELECT id FROM notes LIMIT 1")
        .fetch_optional(pool)
        .await
    {
        Ok(_) => ConnectionStatus {
            ok: true,
            message: "Remote store reachable".to_string(),
            details: None,
        },
        Err(e) => {
            let err = StoreError::from(e);
            warn!("Remote store probe failed: {err}");
            ConnectionStatus {
                ok: false,
                message: "Remote store unreachable; changes are kept locally".to_string(),
                details: Some(err.to_string()),
            }
        }
    }
}
