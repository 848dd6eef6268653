use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::notes::local::{new_local_id, LocalNoteStore, LocalOverlay};
use crate::notes::models::{NewNote, Note, NotePatch};
use crate::notes::views::NoteFilter;
use crate::notes::NoteStore;
use crate::realtime::{ChangeFeed, ChangeTable, Subscription};
use crate::sharing::{check_escalation, check_transition, ShareDecision, ShareRoute};

/// Where a new note ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedNote {
    pub id: String,
    pub stored_remotely: bool,
    #[serde(flatten)]
    pub route: ShareRoute,
}

/// The single logical note collection.
///
/// Reads merge the remote and local stores; writes go to the remote store
/// first and stay durable locally when it fails. Store failures never reach
/// the caller: they degrade to local-only behaviour and are logged.
///
/// Reconciliation rule: a full refresh takes remote rows over local ones with
/// the same id, then re-applies the local overlay (unconfirmed patches and
/// locally deleted ids) until the remote store catches up.
pub struct NoteRepository {
    remote: Option<Arc<dyn NoteStore>>,
    local: LocalNoteStore,
    snapshot: watch::Sender<Vec<Note>>,
}

impl NoteRepository {
    /// `remote = None` runs in local-only mode.
    pub fn new(remote: Option<Arc<dyn NoteStore>>, local: LocalNoteStore) -> Self {
        if remote.is_none() {
            info!("Notes running in local-only mode");
        }
        let (snapshot, _) = watch::channel(Vec::new());
        Self {
            remote,
            local,
            snapshot,
        }
    }

    pub fn is_remote_available(&self) -> bool {
        self.remote.is_some()
    }

    /// Latest merged view, updated on every refresh and optimistic write.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Note>> {
        self.snapshot.subscribe()
    }

    /// Full refresh: newest first, no duplicates, no deleted notes.
    pub async fn list(&self) -> Vec<Note> {
        let remote = match &self.remote {
            Some(store) => match store.list().await {
                Ok(notes) => Some(notes),
                Err(e) => {
                    warn!("Remote note list failed, showing local notes only: {e}");
                    None
                }
            },
            None => None,
        };
        let local = self.local.load();

        if let Some(remote) = &remote {
            let live: BTreeSet<&str> = remote
                .iter()
                .chain(local.iter())
                .map(|n| n.id.as_str())
                .collect();
            if let Err(e) = self.local.prune(&live) {
                warn!("Could not prune local overlay: {e}");
            }
        }

        let merged = merge(remote.unwrap_or_default(), local, &self.local.overlay());
        self.snapshot.send_replace(merged.clone());
        merged
    }

    pub async fn list_filtered(&self, filter: &NoteFilter) -> Vec<Note> {
        filter.apply(self.list().await)
    }

    pub async fn get(&self, id: &str) -> Option<Note> {
        self.list().await.into_iter().find(|n| n.id == id)
    }

    /// Capture flow: persists a new note with its share decision already
    /// applied. Validation happens before any I/O.
    pub async fn create(
        &self,
        draft: NewNote,
        decision: ShareDecision,
    ) -> Result<CreatedNote, AppError> {
        draft.validate()?;
        let mut note = draft.into_note(new_local_id(), Utc::now());
        decision.to_patch().apply_to(&mut note);

        let remote_receipt = match &self.remote {
            Some(store) => match store.create(&note).await {
                Ok(receipt) => Some(receipt),
                Err(e) => {
                    warn!("Remote insert failed, keeping note {} locally: {e}", note.id);
                    None
                }
            },
            None => None,
        };

        let created = match remote_receipt {
            Some(receipt) => {
                if !receipt.is_complete() {
                    warn!(
                        "Note {} stored remotely without {:?}; keeping those locally",
                        receipt.id, receipt.dropped
                    );
                    if let Err(e) = self
                        .local
                        .record_patch(&receipt.id, &note.patch_for(&receipt.dropped))
                    {
                        warn!("Could not record pending fields for {}: {e}", receipt.id);
                    }
                }
                CreatedNote {
                    id: receipt.id,
                    stored_remotely: true,
                    route: decision.route(),
                }
            }
            None => {
                // the one write that must not fail silently
                let receipt = self
                    .local
                    .create(&note)
                    .await
                    .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
                CreatedNote {
                    id: receipt.id,
                    stored_remotely: false,
                    route: decision.route(),
                }
            }
        };

        self.list().await;
        Ok(created)
    }

    /// Applies `patch` to the visible note at once, then tries the remote
    /// store. Returns the note as the caller now sees it.
    pub async fn update(&self, id: &str, patch: NotePatch) -> Result<Note, AppError> {
        let mut current = self.find(id).await?;
        check_transition(current.visibility, current.shared_group_id.as_deref(), &patch)?;
        if patch.is_empty() {
            return Ok(current);
        }

        // phase one: the local view
        let stored_locally = self.local.contains(id);
        let optimistic = if stored_locally {
            self.local.update(id, &patch).await.map(|_| ())
        } else {
            self.local.record_patch(id, &patch)
        };
        if let Err(e) = optimistic {
            warn!("Could not persist optimistic patch for {id}: {e}");
        }
        patch.apply_to(&mut current);
        self.snapshot.send_modify(|notes| {
            if let Some(note) = notes.iter_mut().find(|n| n.id == id) {
                patch.apply_to(note);
            }
        });

        // phase two: the remote store
        if let (Some(store), false) = (&self.remote, stored_locally) {
            match store.update(id, &patch).await {
                Ok(receipt) => {
                    if !receipt.is_complete() {
                        warn!("Remote note {id} kept without {:?}", receipt.dropped);
                    }
                    let persisted: Vec<_> = patch
                        .fields()
                        .into_iter()
                        .filter(|f| !receipt.dropped.contains(f))
                        .collect();
                    if let Err(e) = self.local.settle(id, &persisted) {
                        warn!("Could not settle local overlay for {id}: {e}");
                    }
                    debug!("Note {id} updated remotely");
                }
                Err(e) => warn!("Remote update of note {id} failed, local copy diverges: {e}"),
            }
        }

        Ok(current)
    }

    /// Removes a note from every read. The remote row is only marked.
    pub async fn soft_delete(&self, id: &str) -> Result<(), AppError> {
        self.find(id).await?;

        let stored_locally = self.local.contains(id);
        if stored_locally {
            if let Err(e) = self.local.soft_delete(id).await {
                warn!("Could not remove local note {id}: {e}");
            }
        }

        if let (Some(store), false) = (&self.remote, stored_locally) {
            match store.soft_delete(id).await {
                Ok(()) => debug!("Note {id} soft-deleted remotely"),
                Err(e) => {
                    warn!("Remote soft delete of {id} failed, hiding it locally only: {e}");
                    if let Err(e) = self.local.hide(id) {
                        warn!("Could not hide note {id} locally: {e}");
                    }
                }
            }
        }

        self.snapshot.send_modify(|notes| notes.retain(|n| n.id != id));
        Ok(())
    }

    /// Applies the one-shot share decision to an existing note.
    pub async fn share(&self, id: &str, decision: &ShareDecision) -> Result<ShareRoute, AppError> {
        self.update(id, decision.to_patch()).await?;
        Ok(decision.route())
    }

    /// PLC → proposal escalation: a fresh proposal copy; the PLC record
    /// stays as it is.
    pub async fn propose_copy(&self, id: &str) -> Result<CreatedNote, AppError> {
        let source = self.find(id).await?;
        check_escalation(source.visibility)?;
        let draft = NewNote {
            title: Some(source.title),
            content: source.content,
            note_type: source.note_type,
            tags: source.tags,
            source: source.source,
            reflection: source.reflection,
            owner_id: source.owner_id,
        };
        self.create(draft, ShareDecision::Proposal).await
    }

    /// Re-reads the whole collection on every notes change, for as long as
    /// the returned guard lives.
    pub fn follow(self: &Arc<Self>, feed: &ChangeFeed) -> Subscription {
        let mut events = feed.subscribe();
        let repo = Arc::clone(self);
        Subscription::new(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.table == ChangeTable::Notes => {
                        debug!("Notes changed remotely ({:?}); refreshing", event.op);
                        repo.list().await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Missed {skipped} change events; refreshing");
                        repo.list().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }

    async fn find(&self, id: &str) -> Result<Note, AppError> {
        let cached = self.snapshot.borrow().iter().find(|n| n.id == id).cloned();
        match cached {
            Some(note) => Ok(note),
            None => self
                .get(id)
                .await
                .ok_or_else(|| AppError::NotFound(format!("Note {id} not found"))),
        }
    }
}

/// Remote rows first, then local ones not already seen, with the overlay
/// applied; newest first.
pub fn merge(remote: Vec<Note>, local: Vec<Note>, overlay: &LocalOverlay) -> Vec<Note> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<Note> = remote
        .into_iter()
        .chain(local)
        .filter(|n| !n.is_deleted() && !overlay.is_hidden(&n.id))
        .filter(|n| seen.insert(n.id.clone()))
        .collect();
    for note in &mut merged {
        if let Some(patch) = overlay.patch_for(&note.id) {
            patch.apply_to(note);
        }
    }
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    merged
}
