//! Notes: the unified, offline-resilient note collection.
//!
//! `NoteRepository` composes a remote store and a durable local store behind
//! one logical view. Both stores implement `NoteStore`; the repository tries
//! the remote one first and keeps every write durable locally when it fails.

pub mod handlers;
pub mod local;
pub mod models;
pub mod remote;
pub mod repository;
pub mod shapes;
pub mod views;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;

use crate::store::StoreError;
use models::{Note, NoteField, NotePatch};

/// Result of a write: the id the store persisted under, and the fields it
/// could not persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    pub id: String,
    pub dropped: Vec<NoteField>,
}

impl WriteReceipt {
    pub fn complete(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dropped: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// One backend holding notes.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Live notes only; soft-deleted ones never come back.
    async fn list(&self) -> Result<Vec<Note>, StoreError>;

    async fn create(&self, note: &Note) -> Result<WriteReceipt, StoreError>;

    async fn update(&self, id: &str, patch: &NotePatch) -> Result<WriteReceipt, StoreError>;

    async fn soft_delete(&self, id: &str) -> Result<(), StoreError>;
}
