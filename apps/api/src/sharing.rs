//! The one-shot share decision.
//!
//! A note starts private. Exactly once, at review time, the author decides
//! where it goes: it stays private, it is shared into one PLC group, or it is
//! submitted school-wide as a proposal. All three states are terminal; the
//! only way from PLC to proposal is to propose a fresh copy, which leaves the
//! PLC record untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::groups::{find_group, group_id_by_name};
use crate::notes::models::{NotePatch, Visibility};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShareError {
    #[error("A PLC share needs a group")]
    MissingGroup,

    #[error("Unknown PLC group '{0}'")]
    UnknownGroup(String),

    #[error("A group can only be set together with PLC visibility")]
    GroupRequiresPlc,

    #[error("Note was already shared ({current}); visibility can no longer change")]
    AlreadyShared { current: Visibility },

    #[error("Only PLC records can be proposed school-wide (note is {current})")]
    NotEscalatable { current: Visibility },
}

/// Requested visibility, as sent by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareLevel {
    Private,
    Plc,
    Proposal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub level: ShareLevel,
    #[serde(default)]
    pub group_id: Option<String>,
}

/// A validated share decision. A `Plc` decision always names a known group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareDecision {
    Private,
    Plc { group_id: String },
    Proposal,
}

impl ShareDecision {
    /// Validates a raw decision. The group may be given by id or by display
    /// name; it is normalised to the id.
    pub fn new(level: ShareLevel, group: Option<&str>) -> Result<Self, ShareError> {
        let group = group.map(str::trim).filter(|g| !g.is_empty());
        match (level, group) {
            (ShareLevel::Plc, None) => Err(ShareError::MissingGroup),
            (ShareLevel::Plc, Some(group)) => {
                let id = find_group(group)
                    .map(|g| g.id)
                    .or_else(|| group_id_by_name(group))
                    .ok_or_else(|| ShareError::UnknownGroup(group.to_string()))?;
                Ok(ShareDecision::Plc {
                    group_id: id.to_string(),
                })
            }
            (_, Some(_)) => Err(ShareError::GroupRequiresPlc),
            (ShareLevel::Private, None) => Ok(ShareDecision::Private),
            (ShareLevel::Proposal, None) => Ok(ShareDecision::Proposal),
        }
    }

    pub fn visibility(&self) -> Visibility {
        match self {
            ShareDecision::Private => Visibility::Private,
            ShareDecision::Plc { .. } => Visibility::Plc,
            ShareDecision::Proposal => Visibility::Proposal,
        }
    }

    /// The write that persists this decision.
    pub fn to_patch(&self) -> NotePatch {
        NotePatch {
            visibility: Some(self.visibility()),
            shared_group_id: match self {
                ShareDecision::Plc { group_id } => Some(group_id.clone()),
                _ => None,
            },
            ..Default::default()
        }
    }

    /// Where the note shows up once the decision is persisted.
    pub fn route(&self) -> ShareRoute {
        match self {
            ShareDecision::Private => ShareRoute::Records,
            ShareDecision::Plc { group_id } => ShareRoute::PlcGroup {
                group_id: group_id.clone(),
            },
            ShareDecision::Proposal => ShareRoute::CuratorInbox,
        }
    }
}

impl TryFrom<&ShareRequest> for ShareDecision {
    type Error = ShareError;

    fn try_from(req: &ShareRequest) -> Result<Self, Self::Error> {
        ShareDecision::new(req.level, req.group_id.as_deref())
    }
}

/// The downstream view a share decision lands the note in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum ShareRoute {
    Records,
    #[serde(rename_all = "camelCase")]
    PlcGroup { group_id: String },
    CuratorInbox,
}

/// Checks that `patch` is a legal write for a note currently at `current`.
///
/// Visibility may only move away from private, and only once. A group may
/// only travel with PLC visibility, and a PLC note keeps its group.
pub fn check_transition(
    current: Visibility,
    current_group: Option<&str>,
    patch: &NotePatch,
) -> Result<(), ShareError> {
    let target = patch.visibility.unwrap_or(current);
    let changes_visibility = target != current;

    if changes_visibility && current != Visibility::Private {
        return Err(ShareError::AlreadyShared { current });
    }

    match (&patch.shared_group_id, target) {
        (Some(_), Visibility::Private | Visibility::Proposal) => {
            return Err(ShareError::GroupRequiresPlc)
        }
        (Some(group), Visibility::Plc) => {
            if find_group(group).is_none() {
                return Err(ShareError::UnknownGroup(group.clone()));
            }
            if !changes_visibility && current_group.is_some_and(|g| g != group) {
                return Err(ShareError::AlreadyShared { current });
            }
        }
        (None, Visibility::Plc) if changes_visibility => return Err(ShareError::MissingGroup),
        _ => {}
    }
    Ok(())
}

/// Proposing school-wide is only offered for PLC records.
pub fn check_escalation(current: Visibility) -> Result<(), ShareError> {
    match current {
        Visibility::Plc => Ok(()),
        other => Err(ShareError::NotEscalatable { current: other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plc(group: &str) -> NotePatch {
        NotePatch {
            visibility: Some(Visibility::Plc),
            shared_group_id: Some(group.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_plc_without_group_is_rejected() {
        assert_eq!(
            ShareDecision::new(ShareLevel::Plc, None),
            Err(ShareError::MissingGroup)
        );
        assert_eq!(
            ShareDecision::new(ShareLevel::Plc, Some("  ")),
            Err(ShareError::MissingGroup)
        );
    }

    #[test]
    fn test_plc_group_by_name_is_normalised() {
        let decision = ShareDecision::new(ShareLevel::Plc, Some("PLC ภาษาไทย")).unwrap();
        assert_eq!(
            decision,
            ShareDecision::Plc {
                group_id: "plc-thai".into()
            }
        );
    }

    #[test]
    fn test_unknown_group_is_rejected() {
        assert_eq!(
            ShareDecision::new(ShareLevel::Plc, Some("plc-cooking")),
            Err(ShareError::UnknownGroup("plc-cooking".into()))
        );
    }

    #[test]
    fn test_group_without_plc_is_rejected() {
        assert_eq!(
            ShareDecision::new(ShareLevel::Proposal, Some("plc-math")),
            Err(ShareError::GroupRequiresPlc)
        );
    }

    #[test]
    fn test_decision_patch_and_route() {
        let decision = ShareDecision::new(ShareLevel::Plc, Some("plc-math")).unwrap();
        let patch = decision.to_patch();
        assert_eq!(patch.visibility, Some(Visibility::Plc));
        assert_eq!(patch.shared_group_id.as_deref(), Some("plc-math"));
        assert_eq!(
            serde_json::to_value(decision.route()).unwrap(),
            serde_json::json!({ "route": "plc_group", "groupId": "plc-math" })
        );
        assert_eq!(ShareDecision::Proposal.route(), ShareRoute::CuratorInbox);
    }

    #[test]
    fn test_private_can_move_once() {
        assert!(check_transition(Visibility::Private, None, &plc("plc-math")).is_ok());
        let proposal = ShareDecision::Proposal.to_patch();
        assert!(check_transition(Visibility::Private, None, &proposal).is_ok());
    }

    #[test]
    fn test_shared_notes_are_terminal() {
        let back = ShareDecision::Private.to_patch();
        assert_eq!(
            check_transition(Visibility::Plc, Some("plc-math"), &back),
            Err(ShareError::AlreadyShared {
                current: Visibility::Plc
            })
        );
        let escalate = ShareDecision::Proposal.to_patch();
        assert!(check_transition(Visibility::Plc, Some("plc-math"), &escalate).is_err());
    }

    #[test]
    fn test_plc_group_cannot_move() {
        assert!(check_transition(Visibility::Plc, Some("plc-math"), &plc("plc-math")).is_ok());
        assert!(check_transition(Visibility::Plc, Some("plc-math"), &plc("plc-arts")).is_err());
    }

    #[test]
    fn test_plain_edits_pass() {
        let edit = NotePatch {
            title: Some("X".into()),
            ..Default::default()
        };
        for current in [Visibility::Private, Visibility::Plc, Visibility::Proposal] {
            assert!(check_transition(current, None, &edit).is_ok());
        }
    }

    #[test]
    fn test_patch_to_plc_needs_group() {
        let bare = NotePatch {
            visibility: Some(Visibility::Plc),
            ..Default::default()
        };
        assert_eq!(
            check_transition(Visibility::Private, None, &bare),
            Err(ShareError::MissingGroup)
        );
    }

    #[test]
    fn test_only_plc_escalates() {
        assert!(check_escalation(Visibility::Plc).is_ok());
        assert!(check_escalation(Visibility::Private).is_err());
        assert!(check_escalation(Visibility::Proposal).is_err());
    }
}
