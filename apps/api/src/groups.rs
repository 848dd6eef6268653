use serde::Serialize;

/// Activity badge shown on a group card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    New,
    Updated,
}

/// A professional learning community. Static reference data: the core only
/// resolves ids to names and validates share targets against this list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlcGroup {
    pub id: &'static str,
    pub name: &'static str,
    pub members: u32,
    pub status: GroupStatus,
}

pub const PLC_GROUPS: [PlcGroup; 6] = [
    PlcGroup {
        id: "plc-math",
        name: "PLC คณิตศาสตร์",
        members: 12,
        status: GroupStatus::New,
    },
    PlcGroup {
        id: "plc-science",
        name: "PLC วิทยาศาสตร์",
        members: 15,
        status: GroupStatus::Updated,
    },
    PlcGroup {
        id: "plc-thai",
        name: "PLC ภาษาไทย",
        members: 10,
        status: GroupStatus::New,
    },
    PlcGroup {
        id: "plc-english",
        name: "PLC ภาษาอังกฤษ",
        members: 18,
        status: GroupStatus::Updated,
    },
    PlcGroup {
        id: "plc-social",
        name: "PLC สังคมศึกษา",
        members: 8,
        status: GroupStatus::New,
    },
    PlcGroup {
        id: "plc-arts",
        name: "PLC ศิลปะ",
        members: 14,
        status: GroupStatus::Updated,
    },
];

pub fn find_group(id: &str) -> Option<&'static PlcGroup> {
    PLC_GROUPS.iter().find(|g| g.id == id)
}

/// Reverse lookup used for notes shared by display name on older clients.
pub fn group_id_by_name(name: &str) -> Option<&'static str> {
    PLC_GROUPS.iter().find(|g| g.name == name).map(|g| g.id)
}
