//! Payload shapes for writes against partially migrated `notes` tables.
//!
//! Each shape is the set of columns a write may carry, most complete first.
//! The remote store tries them in order, moving to the next shape only when
//! the backend reports a missing column.

use chrono::{DateTime, Utc};

use crate::notes::models::{Note, NoteField, NotePatch};
use crate::store::payload::{ColumnValue, Payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadShape {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

impl PayloadShape {
    pub fn allows(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }
}

pub const INSERT_FULL: PayloadShape = PayloadShape {
    name: "insert-full",
    columns: &[
        "transcript",
        "title",
        "content",
        "type",
        "visibility",
        "source",
        "tags",
        "ai_reflection",
        "shared_to_plc_id",
        "user_id",
    ],
};

pub const INSERT_BASE: PayloadShape = PayloadShape {
    name: "insert-base",
    columns: &[
        "transcript",
        "title",
        "content",
        "type",
        "visibility",
        "source",
        "tags",
        "ai_reflection",
    ],
};

pub const INSERT_MINIMAL: PayloadShape = PayloadShape {
    name: "insert-minimal",
    columns: &["transcript", "title", "visibility"],
};

pub const UPDATE_FULL: PayloadShape = PayloadShape {
    name: "update-full",
    columns: &[
        "title",
        "content",
        "transcript",
        "type",
        "visibility",
        "tags",
        "source",
        "ai_reflection",
        "shared_to_plc_id",
        "user_id",
        "updated_at",
    ],
};

pub const UPDATE_SAFE: PayloadShape = PayloadShape {
    name: "update-safe",
    columns: &["transcript", "ai_reflection"],
};

pub const INSERT_SHAPES: &[PayloadShape] = &[INSERT_FULL, INSERT_BASE, INSERT_MINIMAL];
pub const UPDATE_SHAPES: &[PayloadShape] = &[UPDATE_FULL, UPDATE_SAFE];

/// Columns that only stamp the write and carry no note field.
const BOOKKEEPING: &[&str] = &["updated_at"];

/// The note field a column persists. Content is written to both `content`
/// and the legacy `transcript` column.
pub fn field_for_column(column: &str) -> Option<NoteField> {
    match column {
        "title" => Some(NoteField::Title),
        "content" | "transcript" => Some(NoteField::Content),
        "type" => Some(NoteField::Type),
        "visibility" => Some(NoteField::Visibility),
        "shared_to_plc_id" => Some(NoteField::SharedGroup),
        "tags" => Some(NoteField::Tags),
        "source" => Some(NoteField::Source),
        "ai_reflection" => Some(NoteField::Reflection),
        "user_id" => Some(NoteField::Owner),
        _ => None,
    }
}

/// The most complete insert payload for a note.
pub fn insert_payload(note: &Note) -> Payload {
    let mut payload = Payload::new()
        .with("transcript", ColumnValue::Text(note.content.clone()))
        .with("title", ColumnValue::Text(note.title.clone()))
        .with("content", ColumnValue::Text(note.content.clone()))
        .with("type", ColumnValue::Text(note.note_type.db_label().to_string()))
        .with(
            "visibility",
            ColumnValue::Text(note.visibility.db_label().to_string()),
        )
        .with("source", ColumnValue::Text(note.source.as_str().to_string()))
        .with("tags", ColumnValue::TextArray(note.tags.clone()));
    if let Some(reflection) = &note.reflection {
        if let Ok(json) = serde_json::to_value(reflection) {
            payload.set("ai_reflection", ColumnValue::Json(json));
        }
    }
    if let Some(group) = &note.shared_group_id {
        payload.set("shared_to_plc_id", ColumnValue::Text(group.clone()));
    }
    if let Some(owner) = &note.owner_id {
        payload.set("user_id", ColumnValue::Text(owner.clone()));
    }
    payload
}

/// The most complete update payload for a patch, stamped with `now`.
pub fn update_payload(patch: &NotePatch, now: DateTime<Utc>) -> Payload {
    let mut payload = Payload::new();
    if let Some(title) = &patch.title {
        payload.set("title", ColumnValue::Text(title.clone()));
    }
    if let Some(content) = &patch.content {
        payload.set("content", ColumnValue::Text(content.clone()));
        payload.set("transcript", ColumnValue::Text(content.clone()));
    }
    if let Some(note_type) = &patch.note_type {
        payload.set("type", ColumnValue::Text(note_type.db_label().to_string()));
    }
    if let Some(visibility) = patch.visibility {
        payload.set(
            "visibility",
            ColumnValue::Text(visibility.db_label().to_string()),
        );
    }
    if let Some(tags) = &patch.tags {
        payload.set("tags", ColumnValue::TextArray(tags.clone()));
    }
    if let Some(source) = patch.source {
        payload.set("source", ColumnValue::Text(source.as_str().to_string()));
    }
    if let Some(reflection) = &patch.reflection {
        if let Ok(json) = serde_json::to_value(reflection) {
            payload.set("ai_reflection", ColumnValue::Json(json));
        }
    }
    if let Some(group) = &patch.shared_group_id {
        payload.set("shared_to_plc_id", ColumnValue::Text(group.clone()));
    }
    if let Some(owner) = &patch.owner_id {
        payload.set("user_id", ColumnValue::Text(owner.clone()));
    }
    if !payload.is_empty() {
        payload.set("updated_at", ColumnValue::Timestamp(now));
    }
    payload
}

/// Narrows `full` to what `shape` allows, minus columns the backend has
/// already reported missing. Returns `None` when nothing but bookkeeping
/// columns would be written.
pub fn fit_to_shape(full: &Payload, shape: &PayloadShape, missing: &[String]) -> Option<Payload> {
    let narrowed = full.narrowed(|c| shape.allows(c) && !missing.iter().any(|m| m == c));
    if narrowed.column_names().all(|c| BOOKKEEPING.contains(&c)) {
        return None;
    }
    Some(narrowed)
}

/// Fields present in `full` none of whose columns made it into `sent`.
pub fn dropped_fields(full: &Payload, sent: &Payload) -> Vec<NoteField> {
    let mut wanted: Vec<NoteField> = full.column_names().filter_map(field_for_column).collect();
    wanted.sort();
    wanted.dedup();
    wanted
        .into_iter()
        .filter(|field| {
            !sent
                .column_names()
                .any(|c| field_for_column(c) == Some(*field))
        })
        .collect()
}
