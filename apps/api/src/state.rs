use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::AuthService;
use crate::chat::repository::ChatHub;
use crate::config::Config;
use crate::notes::repository::NoteRepository;
use crate::reflection_client::ReflectionClient;
use crate::review::ReviewBoard;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub notes: Arc<NoteRepository>,
    pub chat: Arc<ChatHub>,
    pub reflections: ReflectionClient,
    pub auth: AuthService,
    /// Transient curator review status; lost on restart.
    pub reviews: Arc<ReviewBoard>,
    /// `None` in local-only mode.
    pub db: Option<PgPool>,
    pub config: Config,
}
