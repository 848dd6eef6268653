use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::UserRole;
use crate::errors::AppError;
use crate::review::{InboxItem, PipelineColumn, ProposalStatus};
use crate::state::AppState;

/// Header carrying the caller's role, set by the presentation layer after login.
pub const ROLE_HEADER: &str = "x-user-role";

fn require_curator(headers: &HeaderMap) -> Result<(), AppError> {
    let role = headers
        .get(ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(UserRole::parse);
    match role {
        Some(role) if role.is_curator() => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}

#[derive(Serialize)]
pub struct InboxResponse {
    pub items: Vec<InboxItem>,
    pub pipeline: Vec<PipelineColumn>,
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: ProposalStatus,
}

/// GET /api/v1/inbox
pub async fn handle_inbox(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<InboxResponse>, AppError> {
    require_curator(&headers)?;
    let notes = state.notes.list().await;
    Ok(Json(InboxResponse {
        items: state.reviews.inbox(&notes),
        pipeline: state.reviews.pipeline(&notes, Utc::now()),
    }))
}

/// PATCH /api/v1/inbox/:id/status
pub async fn handle_set_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<StatusUpdate>,
) -> Result<Json<InboxItem>, AppError> {
    require_curator(&headers)?;
    let notes = state.notes.list().await;
    if !state.reviews.inbox(&notes).iter().any(|item| item.id == id) {
        return Err(AppError::NotFound(format!("Proposal {id} not found")));
    }
    state.reviews.set_status(&id, req.status);
    state
        .reviews
        .inbox(&notes)
        .into_iter()
        .find(|item| item.id == id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Proposal {id} not found")))
}
