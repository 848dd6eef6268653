use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::db::check_connection;
use crate::state::AppState;

/// GET /health
/// Service status, the remote availability flag and a live connection probe.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let connection = check_connection(state.db.as_ref()).await;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "school-km-api",
        "remoteAvailable": state.notes.is_remote_available(),
        "reflectionConfigured": state.reflections.is_configured(),
        "realtimeEnabled": state.config.realtime_enabled && state.db.is_some(),
        "connection": connection,
    }))
}
