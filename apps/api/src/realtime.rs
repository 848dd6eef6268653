//! Remote change feed.
//!
//! Triggers on the remote tables `pg_notify` a `{table, op, row}` JSON payload
//! on `notes_changes` and `plc_chat_changes`. One listener task relays those
//! notifications onto an in-process broadcast channel; repositories subscribe
//! and re-read what changed.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const NOTES_CHANNEL: &str = "notes_changes";
pub const CHAT_CHANNEL: &str = "plc_chat_changes";

const DEFAULT_CAPACITY: usize = 256;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Notes,
    PlcChatMessages,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One row-level change on the remote store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub op: ChangeOp,
    #[serde(default)]
    pub row: Option<Value>,
}

impl ChangeEvent {
    pub fn parse(payload: &str) -> Option<Self> {
        match serde_json::from_str(payload) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Ignoring malformed change notification: {e}");
                None
            }
        }
    }

    /// The chat group a chat event belongs to, if any.
    pub fn plc_id(&self) -> Option<String> {
        let value = self.row.as_ref()?.get("plc_id")?;
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Fan-out hub for remote change events.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ChangeEvent) {
        // no receivers is fine
        let _ = self.sender.send(event);
    }

    /// Starts relaying Postgres notifications onto this feed. The listener
    /// reconnects after a delay whenever its connection drops.
    pub fn spawn_listener(&self, pool: PgPool) -> Subscription {
        let feed = self.clone();
        Subscription::new(tokio::spawn(async move {
            loop {
                if let Err(e) = feed.relay(&pool).await {
                    warn!(
                        "Change feed listener stopped: {e}; reconnecting in {}s",
                        RECONNECT_DELAY.as_secs()
                    );
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }))
    }

    async fn relay(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        let mut listener = PgListener::connect_with(pool).await?;
        listener.listen_all([NOTES_CHANNEL, CHAT_CHANNEL]).await?;
        info!("Listening for remote changes on {NOTES_CHANNEL}, {CHAT_CHANNEL}");
        loop {
            let notification = listener.recv().await?;
            debug!("Change notification on {}", notification.channel());
            if let Some(event) = ChangeEvent::parse(notification.payload()) {
                self.publish(event);
            }
        }
    }
}

/// Guard for a background task. Dropping it stops the task.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_notes_event() {
        let event = ChangeEvent::parse(r#"{"table":"notes","op":"UPDATE","row":{"id":"1"}}"#)
            .unwrap();
        assert_eq!(event.table, ChangeTable::Notes);
        assert_eq!(event.op, ChangeOp::Update);
    }

    #[test]
    fn test_parse_unknown_table_and_garbage() {
        let event = ChangeEvent::parse(r#"{"table":"users","op":"INSERT"}"#).unwrap();
        assert_eq!(event.table, ChangeTable::Other);
        assert!(event.row.is_none());
        assert!(ChangeEvent::parse("not json").is_none());
    }

    #[test]
    fn test_plc_id_accepts_numbers() {
        let event = ChangeEvent {
            table: ChangeTable::PlcChatMessages,
            op: ChangeOp::Insert,
            row: Some(json!({ "plc_id": 3 })),
        };
        assert_eq!(event.plc_id().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_feed_fans_out_to_all_subscribers() {
        let feed = ChangeFeed::default();
        let mut a = feed.subscribe();
        let mut b = feed.subscribe();
        feed.publish(ChangeEvent {
            table: ChangeTable::Notes,
            op: ChangeOp::Delete,
            row: None,
        });
        assert_eq!(a.recv().await.unwrap().op, ChangeOp::Delete);
        assert_eq!(b.recv().await.unwrap().op, ChangeOp::Delete);
    }

    #[tokio::test]
    async fn test_dropping_subscription_aborts_task() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let sub = Subscription::new(tokio::spawn(async move {
            let _tx = tx;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }));
        assert!(sub.is_active());
        drop(sub);
        // the aborted task drops its sender
        assert!(rx.await.is_err());
    }
}
