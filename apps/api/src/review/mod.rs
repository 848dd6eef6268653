//! Curator review of proposals.
//!
//! Review status has no column on the notes table. It is held in memory by
//! `ReviewBoard` and starts over as PROPOSED whenever the process restarts.

pub mod handlers;

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::notes::models::Note;
use crate::notes::views::curator_inbox;

const OWN_SUBMISSION: &str = "คุณ (เจ้าของ)";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    #[default]
    Proposed,
    InTrial,
    Tested,
    Recommended,
    Paused,
}

impl ProposalStatus {
    pub const ALL: [ProposalStatus; 5] = [
        ProposalStatus::Proposed,
        ProposalStatus::InTrial,
        ProposalStatus::Tested,
        ProposalStatus::Recommended,
        ProposalStatus::Paused,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ProposalStatus::Proposed => "รอพิจารณา",
            ProposalStatus::InTrial => "กำลังทดลอง",
            ProposalStatus::Tested => "ทดลองแล้ว",
            ProposalStatus::Recommended => "แนะนำให้ใช้",
            ProposalStatus::Paused => "พักไว้ก่อน",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxItem {
    pub id: String,
    pub title: String,
    pub submitted_by: String,
    pub submitted_date: String,
    pub topic: String,
    pub status: ProposalStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineItem {
    pub id: String,
    pub title: String,
    pub submitted_by: String,
    pub days_ago: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineColumn {
    pub status: ProposalStatus,
    pub label: &'static str,
    pub items: Vec<PipelineItem>,
}

#[derive(Default)]
pub struct ReviewBoard {
    statuses: RwLock<HashMap<String, ProposalStatus>>,
}

impl ReviewBoard {
    pub fn status_of(&self, id: &str) -> ProposalStatus {
        self.statuses
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_status(&self, id: &str, status: ProposalStatus) {
        self.statuses
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string(), status);
    }

    /// Proposals awaiting review, newest first (the order of `notes`).
    pub fn inbox(&self, notes: &[Note]) -> Vec<InboxItem> {
        curator_inbox(notes)
            .into_iter()
            .map(|note| InboxItem {
                status: self.status_of(&note.id),
                submitted_by: submitter(&note),
                submitted_date: note.created_at.format("%Y-%m-%d").to_string(),
                topic: note.note_type.db_label().to_string(),
                id: note.id,
                title: note.title,
            })
            .collect()
    }

    /// Proposals grouped by status, one column per status.
    pub fn pipeline(&self, notes: &[Note], now: DateTime<Utc>) -> Vec<PipelineColumn> {
        let proposals = curator_inbox(notes);
        ProposalStatus::ALL
            .into_iter()
            .map(|status| PipelineColumn {
                status,
                label: status.label(),
                items: proposals
                    .iter()
                    .filter(|n| self.status_of(&n.id) == status)
                    .map(|n| PipelineItem {
                        id: n.id.clone(),
                        title: n.title.clone(),
                        submitted_by: submitter(n),
                        days_ago: (now - n.created_at).num_days().max(0),
                    })
                    .collect(),
            })
            .collect()
    }
}

fn submitter(note: &Note) -> String {
    note.owner_id
        .clone()
        .unwrap_or_else(|| OWN_SUBMISSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::models::{NewNote, Visibility};
    use chrono::Duration;

    fn proposal(id: &str, age_days: i64) -> Note {
        let mut note = NewNote {
            title: Some(format!("proposal {id}")),
            content: "c".into(),
            ..Default::default()
        }
        .into_note(id.into(), Utc::now() - Duration::days(age_days));
        note.visibility = Visibility::Proposal;
        note
    }

    #[test]
    fn test_status_defaults_to_proposed() {
        let board = ReviewBoard::default();
        assert_eq!(board.status_of("x"), ProposalStatus::Proposed);
        board.set_status("x", ProposalStatus::InTrial);
        assert_eq!(board.status_of("x"), ProposalStatus::InTrial);
    }

    #[test]
    fn test_inbox_skips_non_proposals() {
        let board = ReviewBoard::default();
        let mut private = proposal("p", 0);
        private.visibility = Visibility::Private;
        let items = board.inbox(&[proposal("1", 0), private]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].topic, "ประชุม");
        assert_eq!(items[0].submitted_by, OWN_SUBMISSION);
    }

    #[test]
    fn test_pipeline_groups_by_status() {
        let board = ReviewBoard::default();
        board.set_status("2", ProposalStatus::Recommended);
        let columns = board.pipeline(&[proposal("1", 3), proposal("2", 30)], Utc::now());
        assert_eq!(columns.len(), 5);
        assert_eq!(columns[0].items.len(), 1);
        assert_eq!(columns[0].items[0].days_ago, 3);
        assert_eq!(columns[3].status, ProposalStatus::Recommended);
        assert_eq!(columns[3].items[0].id, "2");
    }

    #[test]
    fn test_status_json_codes() {
        assert_eq!(
            serde_json::to_value(ProposalStatus::InTrial).unwrap(),
            serde_json::json!("IN_TRIAL")
        );
    }
}
