use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::chat::models::{ChatMessage, OutgoingMessage};
use crate::chat::store::{ChatStore, LocalChatStore};
use crate::errors::AppError;
use crate::models::chat::ChatMessageRow;
use crate::realtime::{ChangeEvent, ChangeFeed, ChangeOp, ChangeTable, Subscription};

/// Per-group message log over a remote and a local store.
pub struct ChatRepository {
    remote: Option<Arc<dyn ChatStore>>,
    local: LocalChatStore,
}

impl ChatRepository {
    pub fn new(remote: Option<Arc<dyn ChatStore>>, local: LocalChatStore) -> Self {
        Self { remote, local }
    }

    /// Remote messages plus any that only reached the local store, oldest
    /// first, one copy per id.
    pub async fn list(&self, group_id: &str) -> Vec<ChatMessage> {
        let remote = match &self.remote {
            Some(store) => store.list(group_id).await.unwrap_or_else(|e| {
                warn!("Remote chat list for {group_id} failed, showing local messages: {e}");
                Vec::new()
            }),
            None => Vec::new(),
        };
        let local = self.local.load(group_id);

        let mut seen = HashSet::new();
        let mut messages: Vec<ChatMessage> = remote
            .into_iter()
            .chain(local)
            .filter(|m| m.group_id == group_id)
            .filter(|m| seen.insert(m.id.clone()))
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        messages
    }

    pub async fn send(&self, message: OutgoingMessage) -> Result<ChatMessage, AppError> {
        if let Some(store) = &self.remote {
            match store.append(&message).await {
                Ok(sent) => {
                    debug!("Chat message {} sent to {}", sent.id, sent.group_id);
                    return Ok(sent);
                }
                Err(e) => warn!(
                    "Remote chat insert for {} failed, keeping message locally: {e}",
                    message.group_id
                ),
            }
        }
        self.local
            .append(&message)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
    }
}

/// The live, in-memory message list of one group.
pub struct ChatChannel {
    group_id: String,
    messages: watch::Sender<Vec<ChatMessage>>,
}

impl ChatChannel {
    pub fn new(group_id: impl Into<String>) -> Self {
        let (messages, _) = watch::channel(Vec::new());
        Self {
            group_id: group_id.into(),
            messages,
        }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.messages.subscribe()
    }

    pub async fn reload(&self, repo: &ChatRepository) {
        let fresh = repo.list(&self.group_id).await;
        self.messages.send_replace(fresh);
    }

    /// Adds a message unless one with the same id is already present.
    /// Returns whether it was added.
    pub fn append(&self, message: ChatMessage) -> bool {
        if message.group_id != self.group_id {
            return false;
        }
        self.messages.send_if_modified(|messages| {
            if messages.iter().any(|m| m.id == message.id) {
                return false;
            }
            let at = messages.partition_point(|m| m.created_at <= message.created_at);
            messages.insert(at, message);
            true
        })
    }

    /// Appends rows inserted into this group remotely, for as long as the
    /// returned guard lives.
    pub fn follow(
        self: &Arc<Self>,
        repo: Arc<ChatRepository>,
        feed: &ChangeFeed,
    ) -> Subscription {
        let mut events = feed.subscribe();
        let channel = Arc::clone(self);
        Subscription::new(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => channel.on_event(&repo, event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Chat {} missed {skipped} events; reloading", channel.group_id);
                        channel.reload(&repo).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }

    async fn on_event(&self, repo: &ChatRepository, event: ChangeEvent) {
        if event.table != ChangeTable::PlcChatMessages || event.op != ChangeOp::Insert {
            return;
        }
        if event.plc_id().as_deref() != Some(self.group_id.as_str()) {
            return;
        }
        let row = event
            .row
            .and_then(|row| serde_json::from_value::<ChatMessageRow>(row).ok());
        match row {
            Some(row) => {
                self.append(row.into());
            }
            None => {
                debug!("Unreadable chat row for {}; reloading", self.group_id);
                self.reload(repo).await;
            }
        }
    }
}

/// Open channels by group, created on first use.
pub struct ChatHub {
    repo: Arc<ChatRepository>,
    feed: Option<ChangeFeed>,
    channels: Mutex<HashMap<String, (Arc<ChatChannel>, Option<Subscription>)>>,
}

impl ChatHub {
    pub fn new(repo: Arc<ChatRepository>, feed: Option<ChangeFeed>) -> Self {
        Self {
            repo,
            feed,
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub async fn channel(&self, group_id: &str) -> Arc<ChatChannel> {
        let existing = self
            .channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(group_id)
            .map(|(channel, _)| Arc::clone(channel));
        if let Some(channel) = existing {
            return channel;
        }

        let channel = Arc::new(ChatChannel::new(group_id));
        let guard = self
            .feed
            .as_ref()
            .map(|feed| channel.follow(Arc::clone(&self.repo), feed));
        channel.reload(&self.repo).await;
        info!("Opened chat channel {group_id}");

        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let (channel, _) = channels
            .entry(group_id.to_string())
            .or_insert((channel, guard));
        Arc::clone(channel)
    }

    /// Current messages of a group. Every read reloads the channel: the feed
    /// only covers rows inserted while the listener was connected and the
    /// remote store was reachable.
    pub async fn messages(&self, group_id: &str) -> Vec<ChatMessage> {
        let channel = self.channel(group_id).await;
        channel.reload(&self.repo).await;
        channel.messages()
    }

    pub async fn send(&self, message: OutgoingMessage) -> Result<ChatMessage, AppError> {
        let channel = self.channel(&message.group_id).await;
        let sent = self.repo.send(message).await?;
        channel.append(sent.clone());
        Ok(sent)
    }
}
