use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::groups::{find_group, PlcGroup, PLC_GROUPS};
use crate::notes::models::{NewNote, Note, NotePatch};
use crate::notes::repository::CreatedNote;
use crate::notes::views::{plc_records, shareable_into, NoteFilter};
use crate::sharing::{ShareDecision, ShareRequest, ShareRoute};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteListResponse {
    pub notes: Vec<Note>,
    pub remote_available: bool,
}

/// Capture flow body: the note plus its one-shot share decision.
#[derive(Deserialize)]
pub struct CreateNoteRequest {
    #[serde(flatten)]
    pub note: NewNote,
    #[serde(default)]
    pub share: Option<ShareRequest>,
}

#[derive(Deserialize)]
pub struct ShareableQuery {
    #[serde(default)]
    pub owner: Option<String>,
}

/// GET /api/v1/notes
pub async fn handle_list_notes(
    State(state): State<AppState>,
    Query(filter): Query<NoteFilter>,
) -> Json<NoteListResponse> {
    Json(NoteListResponse {
        notes: state.notes.list_filtered(&filter).await,
        remote_available: state.notes.is_remote_available(),
    })
}

/// POST /api/v1/notes
pub async fn handle_create_note(
    State(state): State<AppState>,
    Json(req): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<CreatedNote>), AppError> {
    let decision = match &req.share {
        Some(share) => ShareDecision::try_from(share)?,
        None => ShareDecision::Private,
    };
    let created = state.notes.create(req.note, decision).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /api/v1/notes/:id
pub async fn handle_update_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<NotePatch>,
) -> Result<Json<Note>, AppError> {
    Ok(Json(state.notes.update(&id, patch).await?))
}

/// DELETE /api/v1/notes/:id
pub async fn handle_delete_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.notes.soft_delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/notes/:id/share
pub async fn handle_share_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ShareRequest>,
) -> Result<Json<ShareRoute>, AppError> {
    let decision = ShareDecision::try_from(&req)?;
    Ok(Json(state.notes.share(&id, &decision).await?))
}

/// POST /api/v1/notes/:id/propose
pub async fn handle_propose_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<CreatedNote>), AppError> {
    let created = state.notes.propose_copy(&id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/plc
pub async fn handle_list_groups() -> Json<Vec<PlcGroup>> {
    Json(PLC_GROUPS.to_vec())
}

/// GET /api/v1/plc/:id/records
pub async fn handle_group_records(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<Note>>, AppError> {
    let group = find_group(&group_id)
        .ok_or_else(|| AppError::NotFound(format!("PLC group {group_id} not found")))?;
    let notes = state.notes.list().await;
    Ok(Json(plc_records(&notes, group.id)))
}

/// GET /api/v1/plc/:id/shareable
pub async fn handle_shareable_notes(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Query(query): Query<ShareableQuery>,
) -> Result<Json<Vec<Note>>, AppError> {
    let group = find_group(&group_id)
        .ok_or_else(|| AppError::NotFound(format!("PLC group {group_id} not found")))?;
    let notes = state.notes.list().await;
    Ok(Json(shareable_into(&notes, group.id, query.owner.as_deref())))
}
