use serde::Deserialize;

use crate::notes::models::{Note, Visibility};

/// Query-string filter over a note snapshot. All parts are optional and
/// combine with AND.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteFilter {
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default, rename = "group")]
    pub group_id: Option<String>,
    #[serde(default, rename = "owner")]
    pub owner_id: Option<String>,
    #[serde(default, rename = "q")]
    pub query: Option<String>,
}

impl NoteFilter {
    pub fn matches(&self, note: &Note) -> bool {
        if self.visibility.is_some_and(|v| v != note.visibility) {
            return false;
        }
        if let Some(group) = self.group_id.as_deref().filter(|g| !g.is_empty()) {
            if note.shared_group_id.as_deref() != Some(group) {
                return false;
            }
        }
        if let Some(owner) = self.owner_id.as_deref().filter(|o| !o.is_empty()) {
            if note.owner_id.as_deref() != Some(owner) {
                return false;
            }
        }
        match self.query.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => note.title.to_lowercase().contains(&q.to_lowercase()),
            _ => true,
        }
    }

    pub fn apply(&self, notes: Vec<Note>) -> Vec<Note> {
        notes.into_iter().filter(|n| self.matches(n)).collect()
    }
}

/// Records shared into one PLC group.
pub fn plc_records(notes: &[Note], group_id: &str) -> Vec<Note> {
    notes
        .iter()
        .filter(|n| n.visibility == Visibility::Plc && n.shared_group_id.as_deref() == Some(group_id))
        .cloned()
        .collect()
}

/// Everything awaiting curator review.
pub fn curator_inbox(notes: &[Note]) -> Vec<Note> {
    notes
        .iter()
        .filter(|n| n.visibility == Visibility::Proposal)
        .cloned()
        .collect()
}

/// Notes an owner could still share into `group_id`: their own, not already
/// shared there. With no owner given every note counts as the caller's.
pub fn shareable_into(notes: &[Note], group_id: &str, owner_id: Option<&str>) -> Vec<Note> {
    notes
        .iter()
        .filter(|n| owner_id.is_none() || n.owner_id.as_deref() == owner_id)
        .filter(|n| n.visibility == Visibility::Private)
        .filter(|n| n.shared_group_id.as_deref() != Some(group_id))
        .cloned()
        .collect()
}
