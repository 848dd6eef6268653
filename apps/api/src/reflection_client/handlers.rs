use axum::{extract::State, Json};
use serde::Deserialize;

use crate::notes::models::Reflection;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ReflectionRequestBody {
    #[serde(default)]
    pub transcript: String,
}

/// POST /api/v1/reflections
/// Always answers 200: a failed AI call yields the fallback reflection.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(req): Json<ReflectionRequestBody>,
) -> Json<Reflection> {
    Json(state.reflections.generate(&req.transcript).await)
}
