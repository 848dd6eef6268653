use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::chat::models::{ChatMessage, OutgoingMessage, SendMessageRequest};
use crate::errors::AppError;
use crate::groups::find_group;
use crate::state::AppState;

fn known_group(id: &str) -> Result<(), AppError> {
    find_group(id)
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("PLC group {id} not found")))
}

/// GET /api/v1/plc/:id/messages
pub async fn handle_list_messages(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    known_group(&group_id)?;
    Ok(Json(state.chat.messages(&group_id).await))
}

/// POST /api/v1/plc/:id/messages
pub async fn handle_send_message(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    known_group(&group_id)?;
    let message = OutgoingMessage::new(&group_id, &req.sender_id, &req.sender_name, &req.body)?;
    let sent = state.chat.send(message).await?;
    Ok((StatusCode::CREATED, Json(sent)))
}
