mod auth;
mod chat;
mod config;
mod db;
mod errors;
mod groups;
mod models;
mod notes;
mod realtime;
mod reflection_client;
mod review;
mod routes;
mod sharing;
mod state;
mod store;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::{AuthService, PgUserDirectory, UserDirectory};
use crate::chat::repository::{ChatHub, ChatRepository};
use crate::chat::store::{ChatStore, LocalChatStore, PgChatStore};
use crate::config::Config;
use crate::db::{check_connection, create_pool};
use crate::notes::local::LocalNoteStore;
use crate::notes::remote::RemoteNoteStore;
use crate::notes::repository::NoteRepository;
use crate::notes::NoteStore;
use crate::realtime::ChangeFeed;
use crate::reflection_client::ReflectionClient;
use crate::review::ReviewBoard;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::kv::{FileKvStore, KeyValueStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting School KM API v{}", env!("CARGO_PKG_VERSION"));

    // Remote store is optional; without it everything runs local-only
    let db = match &config.database_url {
        Some(url) => Some(create_pool(url)?),
        None => {
            warn!("DATABASE_URL not set; notes and chat are kept on this device only");
            None
        }
    };
    let probe = check_connection(db.as_ref()).await;
    info!("Remote store: {}", probe.message);

    let kv: Arc<dyn KeyValueStore> = Arc::new(
        FileKvStore::open(&config.local_store_dir).with_context(|| {
            format!(
                "Cannot open local store at {}",
                config.local_store_dir.display()
            )
        })?,
    );

    let remote_notes: Option<Arc<dyn NoteStore>> = db
        .clone()
        .map(|pool| Arc::new(RemoteNoteStore::postgres(pool)) as Arc<dyn NoteStore>);
    let notes = Arc::new(NoteRepository::new(
        remote_notes,
        LocalNoteStore::new(kv.clone()),
    ));

    let remote_chat: Option<Arc<dyn ChatStore>> = db
        .clone()
        .map(|pool| Arc::new(PgChatStore::new(pool)) as Arc<dyn ChatStore>);
    let chat_repo = Arc::new(ChatRepository::new(
        remote_chat,
        LocalChatStore::new(kv.clone()),
    ));

    // Realtime: one listener relays remote changes to every repository
    let feed = match (&db, config.realtime_enabled) {
        (Some(_), true) => Some(ChangeFeed::default()),
        _ => None,
    };
    let _listener = match (&feed, &db) {
        (Some(feed), Some(pool)) => Some(feed.spawn_listener(pool.clone())),
        _ => None,
    };
    let _notes_follower = feed.as_ref().map(|feed| notes.follow(feed));
    let chat = Arc::new(ChatHub::new(chat_repo, feed.clone()));

    let directory: Option<Arc<dyn UserDirectory>> = db
        .clone()
        .map(|pool| Arc::new(PgUserDirectory::new(pool)) as Arc<dyn UserDirectory>);

    let reflections = ReflectionClient::new(config.reflection_endpoint.clone())
        .context("Failed to build reflection HTTP client")?;
    info!(
        "Reflection client initialized (endpoint configured: {})",
        reflections.is_configured()
    );

    notes.list().await;

    // Build app state
    let state = AppState {
        notes,
        chat,
        reflections,
        auth: AuthService::new(directory),
        reviews: Arc::new(ReviewBoard::default()),
        db,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
