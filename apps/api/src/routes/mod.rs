pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::auth::handlers as auth;
use crate::chat::handlers as chat;
use crate::notes::handlers as notes;
use crate::reflection_client::handlers as reflections;
use crate::review::handlers as review;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Notes
        .route(
            "/api/v1/notes",
            get(notes::handle_list_notes).post(notes::handle_create_note),
        )
        .route(
            "/api/v1/notes/:id",
            patch(notes::handle_update_note).delete(notes::handle_delete_note),
        )
        .route("/api/v1/notes/:id/share", post(notes::handle_share_note))
        .route("/api/v1/notes/:id/propose", post(notes::handle_propose_note))
        // PLC groups
        .route("/api/v1/plc", get(notes::handle_list_groups))
        .route("/api/v1/plc/:id/records", get(notes::handle_group_records))
        .route(
            "/api/v1/plc/:id/shareable",
            get(notes::handle_shareable_notes),
        )
        .route(
            "/api/v1/plc/:id/messages",
            get(chat::handle_list_messages).post(chat::handle_send_message),
        )
        // Reflections
        .route("/api/v1/reflections", post(reflections::handle_generate))
        // Curator review
        .route("/api/v1/inbox", get(review::handle_inbox))
        .route("/api/v1/inbox/:id/status", patch(review::handle_set_status))
        // Auth
        .route("/api/v1/auth/login", post(auth::handle_login))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::auth::AuthService;
    use crate::chat::repository::{ChatHub, ChatRepository};
    use crate::chat::store::LocalChatStore;
    use crate::config::Config;
    use crate::notes::local::LocalNoteStore;
    use crate::notes::repository::NoteRepository;
    use crate::reflection_client::ReflectionClient;
    use crate::review::ReviewBoard;
    use crate::store::kv::{KeyValueStore, MemoryKvStore};

    fn test_state() -> AppState {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKvStore::default());
        let chat_repo = Arc::new(ChatRepository::new(None, LocalChatStore::new(kv.clone())));
        AppState {
            notes: Arc::new(NoteRepository::new(None, LocalNoteStore::new(kv))),
            chat: Arc::new(ChatHub::new(chat_repo, None)),
            reflections: ReflectionClient::new(None).unwrap(),
            auth: AuthService::new(None),
            reviews: Arc::new(ReviewBoard::default()),
            db: None,
            config: Config {
                database_url: None,
                reflection_endpoint: None,
                local_store_dir: "./data/test".into(),
                realtime_enabled: false,
                port: 0,
                rust_log: "info".into(),
            },
        }
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_reports_local_only() {
        let app = build_router(test_state());
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["remoteAvailable"], false);
        assert_eq!(body["connection"]["ok"], false);
    }

    #[tokio::test]
    async fn test_capture_and_share_flow() {
        let app = build_router(test_state());
        let (status, created) = send(
            &app,
            "POST",
            "/api/v1/notes",
            Some(json!({
                "title": "สรุปประชุม",
                "content": "วางแผนการสอน",
                "type": "meeting",
                "tags": ["PLC"],
                "share": { "level": "plc", "groupId": "plc-math" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["route"], "plc_group");
        assert_eq!(created["groupId"], "plc-math");
        assert_eq!(created["storedRemotely"], false);

        let (_, records) = send(&app, "GET", "/api/v1/plc/plc-math/records", None).await;
        assert_eq!(records.as_array().unwrap().len(), 1);
        assert_eq!(records[0]["sharedGroupId"], "plc-math");
    }

    #[tokio::test]
    async fn test_plc_share_without_group_is_400() {
        let app = build_router(test_state());
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/notes",
            Some(json!({ "content": "x", "share": { "level": "plc" } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (_, list) = send(&app, "GET", "/api/v1/notes", None).await;
        assert!(list["notes"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let app = build_router(test_state());
        let (_, created) = send(&app, "POST", "/api/v1/notes", Some(json!({ "content": "a" }))).await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, note) = send(
            &app,
            "PATCH",
            &format!("/api/v1/notes/{id}"),
            Some(json!({ "title": "X" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(note["title"], "X");

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/notes/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &format!("/api/v1/notes/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_visibility_is_rejected() {
        let app = build_router(test_state());
        let (status, _) = send(&app, "GET", "/api/v1/notes?visibility=foo", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, created) = send(&app, "POST", "/api/v1/notes", Some(json!({ "content": "a" }))).await;
        let id = created["id"].as_str().unwrap().to_string();
        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/api/v1/notes/{id}"),
            Some(json!({ "visibility": "public" })),
        )
        .await;
        assert!(status.is_client_error());

        let (_, list) = send(&app, "GET", "/api/v1/notes?visibility=private", None).await;
        assert_eq!(list["notes"][0]["visibility"], "private");
    }

    #[tokio::test]
    async fn test_chat_round_trip_and_unknown_group() {
        let app = build_router(test_state());
        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/plc/plc-thai/messages",
            Some(json!({ "senderId": "u1", "senderName": "ครูสมชาย", "body": " สวัสดี " })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, messages) = send(&app, "GET", "/api/v1/plc/plc-thai/messages", None).await;
        assert_eq!(messages[0]["body"], "สวัสดี");
        let (_, other) = send(&app, "GET", "/api/v1/plc/plc-math/messages", None).await;
        assert!(other.as_array().unwrap().is_empty());

        let (status, _) = send(&app, "GET", "/api/v1/plc/plc-nope/messages", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reflection_never_fails() {
        let app = build_router(test_state());
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/reflections",
            Some(json!({ "transcript": "บันทึก" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["keyPoints"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_inbox_requires_curator() {
        let app = build_router(test_state());
        let (status, _) = send(&app, "GET", "/api/v1/inbox", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/inbox")
                    .header("x-user-role", "PRINCIPAL")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_without_remote_is_503() {
        let app = build_router(test_state());
        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": "a@b.c", "password": "demo1234" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
