use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::notes::models::{Note, NoteField, NotePatch};
use crate::notes::{NoteStore, WriteReceipt};
use crate::store::kv::{load_json, load_json_for_update, save_json, KeyValueStore};
use crate::store::StoreError;

pub const NOTES_KEY: &str = "school_notes";
pub const OVERLAY_KEY: &str = "school_notes_overlay";

/// Id for a note that has not reached the remote store:
/// `<unix millis>-<7 random chars>`.
pub fn new_local_id() -> String {
    let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(7).collect();
    format!("{}-{suffix}", Utc::now().timestamp_millis())
}

/// Local state layered over whatever the remote store returns: patches the
/// remote store has not accepted yet, and ids deleted locally whose remote
/// rows may still be live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalOverlay {
    #[serde(default)]
    pub patches: BTreeMap<String, NotePatch>,
    #[serde(default)]
    pub hidden: BTreeSet<String>,
}

impl LocalOverlay {
    pub fn is_hidden(&self, id: &str) -> bool {
        self.hidden.contains(id)
    }

    pub fn patch_for(&self, id: &str) -> Option<&NotePatch> {
        self.patches.get(id)
    }
}

/// Durable note collection on the local device.
///
/// Every mutation rewrites a whole blob, so writers hold `writer` from load
/// to save. Clones share it.
#[derive(Clone)]
pub struct LocalNoteStore {
    kv: Arc<dyn KeyValueStore>,
    writer: Arc<Mutex<()>>,
}

impl LocalNoteStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            writer: Arc::new(Mutex::new(())),
        }
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn load(&self) -> Vec<Note> {
        load_json(self.kv.as_ref(), NOTES_KEY)
    }

    fn load_for_update(&self) -> Result<Vec<Note>, StoreError> {
        load_json_for_update(self.kv.as_ref(), NOTES_KEY)
    }

    fn save(&self, notes: &[Note]) -> Result<(), StoreError> {
        save_json(self.kv.as_ref(), NOTES_KEY, notes)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.load().iter().any(|n| n.id == id)
    }

    pub fn overlay(&self) -> LocalOverlay {
        load_json(self.kv.as_ref(), OVERLAY_KEY)
    }

    fn overlay_for_update(&self) -> Result<LocalOverlay, StoreError> {
        load_json_for_update(self.kv.as_ref(), OVERLAY_KEY)
    }

    fn save_overlay(&self, overlay: &LocalOverlay) -> Result<(), StoreError> {
        save_json(self.kv.as_ref(), OVERLAY_KEY, overlay)
    }

    /// Records a patch the remote store has not confirmed. Later patches
    /// merge into earlier ones field by field.
    pub fn record_patch(&self, id: &str, patch: &NotePatch) -> Result<(), StoreError> {
        let _guard = self.write_guard();
        let mut overlay = self.overlay_for_update()?;
        overlay
            .patches
            .entry(id.to_string())
            .or_default()
            .merge(patch);
        self.save_overlay(&overlay)
    }

    /// Drops the fields the remote store has now persisted.
    pub fn settle(&self, id: &str, persisted: &[NoteField]) -> Result<(), StoreError> {
        let _guard = self.write_guard();
        let mut overlay = self.overlay_for_update()?;
        let Some(pending) = overlay.patches.get_mut(id) else {
            return Ok(());
        };
        pending.forget(persisted);
        if pending.is_empty() {
            overlay.patches.remove(id);
        }
        self.save_overlay(&overlay)
    }

    pub fn hide(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.write_guard();
        let mut overlay = self.overlay_for_update()?;
        overlay.patches.remove(id);
        if overlay.hidden.insert(id.to_string()) {
            debug!("Note {id} hidden locally");
        }
        self.save_overlay(&overlay)
    }

    /// Forgets overlay entries for notes that exist in neither store any more.
    pub fn prune(&self, live_ids: &BTreeSet<&str>) -> Result<(), StoreError> {
        let _guard = self.write_guard();
        let mut overlay = self.overlay_for_update()?;
        let before = (overlay.patches.len(), overlay.hidden.len());
        overlay.patches.retain(|id, _| live_ids.contains(id.as_str()));
        overlay.hidden.retain(|id| live_ids.contains(id.as_str()));
        if (overlay.patches.len(), overlay.hidden.len()) == before {
            return Ok(());
        }
        self.save_overlay(&overlay)
    }
}

#[async_trait]
impl NoteStore for LocalNoteStore {
    async fn list(&self) -> Result<Vec<Note>, StoreError> {
        Ok(self.load().into_iter().filter(|n| !n.is_deleted()).collect())
    }

    async fn create(&self, note: &Note) -> Result<WriteReceipt, StoreError> {
        let _guard = self.write_guard();
        let mut notes = self.load_for_update()?;
        notes.retain(|n| n.id != note.id);
        notes.insert(0, note.clone());
        self.save(&notes)?;
        debug!("Note {} stored locally", note.id);
        Ok(WriteReceipt::complete(note.id.clone()))
    }

    async fn update(&self, id: &str, patch: &NotePatch) -> Result<WriteReceipt, StoreError> {
        let _guard = self.write_guard();
        let mut notes = self.load_for_update()?;
        let note = notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| StoreError::Rejected(format!("note {id} is not stored locally")))?;
        patch.apply_to(note);
        self.save(&notes)?;
        Ok(WriteReceipt::complete(id))
    }

    async fn soft_delete(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.write_guard();
        let mut notes = self.load_for_update()?;
        notes.retain(|n| n.id != id);
        self.save(&notes)
    }
}
