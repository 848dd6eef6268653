use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::models::note::NoteRow;

/// Titles derived from content keep this many characters.
const TITLE_PREFIX_CHARS: usize = 50;
/// Title used when a note has neither a title nor any content.
const UNTITLED_VOICE_NOTE: &str = "บันทึกเสียง";

// ────────────────────────────────────────────────────────────────────────────
// Categorical fields
// ────────────────────────────────────────────────────────────────────────────

/// Who may read a note downstream.
///
/// Serialized as `private` / `plc` / `proposal`. The remote store keeps the
/// labels `ส่วนตัว` / `PLC` / `ข้อเสนอ`; both spellings parse, case-insensitively.
/// Deserializing rejects anything else; remote rows go through the lenient
/// [`Visibility::parse`], where unknown values read as private.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Visibility {
    #[default]
    Private,
    Plc,
    Proposal,
}

impl Visibility {
    pub fn from_code(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "private" | "ส่วนตัว" => Some(Visibility::Private),
            "plc" | "plc-group" => Some(Visibility::Plc),
            "proposal" | "ข้อเสนอ" => Some(Visibility::Proposal),
            _ => None,
        }
    }

    pub fn parse(raw: &str) -> Self {
        Self::from_code(raw).unwrap_or_default()
    }

    pub fn code(self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Plc => "plc",
            Visibility::Proposal => "proposal",
        }
    }

    /// Value written to the remote `visibility` column.
    pub fn db_label(self) -> &'static str {
        match self {
            Visibility::Private => "ส่วนตัว",
            Visibility::Plc => "PLC",
            Visibility::Proposal => "ข้อเสนอ",
        }
    }
}

impl TryFrom<String> for Visibility {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Visibility::from_code(&raw).ok_or_else(|| {
            format!("unknown visibility '{raw}', expected private, plc or proposal")
        })
    }
}

impl From<Visibility> for String {
    fn from(v: Visibility) -> Self {
        v.code().to_string()
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Category of a note. Unknown categories from older clients are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NoteType {
    #[default]
    Meeting,
    Plc,
    Idea,
    Teaching,
    Other(String),
}

impl NoteType {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.to_lowercase().as_str() {
            "" | "meeting" | "ประชุม" => NoteType::Meeting,
            "plc" => NoteType::Plc,
            "idea" | "ไอเดีย" => NoteType::Idea,
            "teaching" | "teaching-practice" | "การสอน" => NoteType::Teaching,
            _ => NoteType::Other(raw.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            NoteType::Meeting => "meeting",
            NoteType::Plc => "plc",
            NoteType::Idea => "idea",
            NoteType::Teaching => "teaching",
            NoteType::Other(raw) => raw,
        }
    }

    /// Value written to the remote `type` column.
    pub fn db_label(&self) -> &str {
        match self {
            NoteType::Meeting => "ประชุม",
            NoteType::Plc => "PLC",
            NoteType::Idea => "ไอเดีย",
            NoteType::Teaching => "การสอน",
            NoteType::Other(raw) => raw,
        }
    }
}

impl From<String> for NoteType {
    fn from(raw: String) -> Self {
        NoteType::parse(&raw)
    }
}

impl From<NoteType> for String {
    fn from(t: NoteType) -> Self {
        t.code().to_string()
    }
}

/// Provenance of the note text. Display-only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Typed,
    #[default]
    Voice,
}

impl Source {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "typed" => Source::Typed,
            _ => Source::Voice,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Typed => "typed",
            Source::Voice => "voice",
        }
    }
}

/// Structured AI output attached to a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reflection {
    pub key_points: Vec<String>,
    pub questions: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Reflection {
    /// Accepts a JSON object only when all three lists are present and
    /// every entry is a string.
    pub fn from_value(value: &Value) -> Option<Self> {
        let list = |key: &str| -> Option<Vec<String>> {
            value
                .get(key)?
                .as_array()?
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect()
        };
        Some(Self {
            key_points: list("keyPoints")?,
            questions: list("questions")?,
            suggestions: list("suggestions")?,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Note
// ────────────────────────────────────────────────────────────────────────────

/// A unit of captured knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub note_type: NoteType,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_group_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<Reflection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Note {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// A patch carrying this note's current values for `fields`.
    pub fn patch_for(&self, fields: &[NoteField]) -> NotePatch {
        let mut patch = NotePatch::default();
        for field in fields {
            match field {
                NoteField::Title => patch.title = Some(self.title.clone()),
                NoteField::Content => patch.content = Some(self.content.clone()),
                NoteField::Type => patch.note_type = Some(self.note_type.clone()),
                NoteField::Visibility => patch.visibility = Some(self.visibility),
                NoteField::SharedGroup => patch.shared_group_id = self.shared_group_id.clone(),
                NoteField::Tags => patch.tags = Some(self.tags.clone()),
                NoteField::Source => patch.source = Some(self.source),
                NoteField::Reflection => patch.reflection = self.reflection.clone(),
                NoteField::Owner => patch.owner_id = self.owner_id.clone(),
            }
        }
        patch
    }
}

/// Title shown when none was given: the first 50 characters of the content,
/// with an ellipsis when truncated.
pub fn derive_title(content: &str) -> String {
    let content = content.trim();
    if content.is_empty() {
        return UNTITLED_VOICE_NOTE.to_string();
    }
    let mut chars = content.chars();
    let prefix: String = chars.by_ref().take(TITLE_PREFIX_CHARS).collect();
    if chars.next().is_some() {
        format!("{prefix}…")
    } else {
        prefix
    }
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        let content = row
            .content
            .filter(|c| !c.is_empty())
            .or(row.transcript)
            .unwrap_or_default();
        let title = row
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| derive_title(&content));
        Note {
            id: row.id,
            title,
            content,
            note_type: row.note_type.as_deref().map(NoteType::parse).unwrap_or_default(),
            visibility: row
                .visibility
                .as_deref()
                .map(Visibility::parse)
                .unwrap_or_default(),
            shared_group_id: row.shared_to_plc_id.filter(|id| !id.is_empty()),
            tags: row.tags.unwrap_or_default(),
            source: row.source.as_deref().map(Source::parse).unwrap_or_default(),
            reflection: row.ai_reflection.as_ref().and_then(Reflection::from_value),
            owner_id: row.user_id,
            created_at: row.created_at.unwrap_or_default(),
            deleted_at: row.deleted_at,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Writes
// ────────────────────────────────────────────────────────────────────────────

/// A freshly captured note, before any store has assigned it an id.
/// Visibility is not part of the draft: it comes from the share decision.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub note_type: NoteType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub reflection: Option<Reflection>,
    #[serde(default)]
    pub owner_id: Option<String>,
}

impl NewNote {
    pub fn validate(&self) -> Result<(), AppError> {
        let has_title = self.title.as_deref().is_some_and(|t| !t.trim().is_empty());
        if self.content.trim().is_empty() && !has_title {
            return Err(AppError::Validation(
                "A note needs a title or some content".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the full note. Tags are de-duplicated, keeping first occurrence.
    pub fn into_note(self, id: String, created_at: DateTime<Utc>) -> Note {
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| derive_title(&self.content));
        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in self.tags {
            let tag = tag.trim().to_string();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        Note {
            id,
            title,
            content: self.content,
            note_type: self.note_type,
            visibility: Visibility::Private,
            shared_group_id: None,
            tags,
            source: self.source,
            reflection: self.reflection,
            owner_id: self.owner_id,
            created_at,
            deleted_at: None,
        }
    }
}

/// The fields a write may carry. Used to report which parts of a write a
/// narrowed remote payload could not persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteField {
    Title,
    Content,
    Type,
    Visibility,
    SharedGroup,
    Tags,
    Source,
    Reflection,
    Owner,
}

/// A partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub note_type: Option<NoteType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<Reflection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

impl NotePatch {
    pub fn fields(&self) -> Vec<NoteField> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push(NoteField::Title);
        }
        if self.content.is_some() {
            fields.push(NoteField::Content);
        }
        if self.note_type.is_some() {
            fields.push(NoteField::Type);
        }
        if self.visibility.is_some() {
            fields.push(NoteField::Visibility);
        }
        if self.shared_group_id.is_some() {
            fields.push(NoteField::SharedGroup);
        }
        if self.tags.is_some() {
            fields.push(NoteField::Tags);
        }
        if self.source.is_some() {
            fields.push(NoteField::Source);
        }
        if self.reflection.is_some() {
            fields.push(NoteField::Reflection);
        }
        if self.owner_id.is_some() {
            fields.push(NoteField::Owner);
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    pub fn apply_to(&self, note: &mut Note) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(note_type) = &self.note_type {
            note.note_type = note_type.clone();
        }
        if let Some(visibility) = self.visibility {
            note.visibility = visibility;
        }
        if let Some(group) = &self.shared_group_id {
            note.shared_group_id = Some(group.clone());
        }
        if let Some(tags) = &self.tags {
            note.tags = tags.clone();
        }
        if let Some(source) = self.source {
            note.source = source;
        }
        if let Some(reflection) = &self.reflection {
            note.reflection = Some(reflection.clone());
        }
        if let Some(owner) = &self.owner_id {
            note.owner_id = Some(owner.clone());
        }
    }

    /// Folds a later patch into this one; the later value wins per field.
    pub fn merge(&mut self, later: &NotePatch) {
        if later.title.is_some() {
            self.title = later.title.clone();
        }
        if later.content.is_some() {
            self.content = later.content.clone();
        }
        if later.note_type.is_some() {
            self.note_type = later.note_type.clone();
        }
        if later.visibility.is_some() {
            self.visibility = later.visibility;
        }
        if later.shared_group_id.is_some() {
            self.shared_group_id = later.shared_group_id.clone();
        }
        if later.tags.is_some() {
            self.tags = later.tags.clone();
        }
        if later.source.is_some() {
            self.source = later.source;
        }
        if later.reflection.is_some() {
            self.reflection = later.reflection.clone();
        }
        if later.owner_id.is_some() {
            self.owner_id = later.owner_id.clone();
        }
    }

    /// Clears the given fields.
    pub fn forget(&mut self, fields: &[NoteField]) {
        for field in fields {
            match field {
                NoteField::Title => self.title = None,
                NoteField::Content => self.content = None,
                NoteField::Type => self.note_type = None,
                NoteField::Visibility => self.visibility = None,
                NoteField::SharedGroup => self.shared_group_id = None,
                NoteField::Tags => self.tags = None,
                NoteField::Source => self.source = None,
                NoteField::Reflection => self.reflection = None,
                NoteField::Owner => self.owner_id = None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: &str) -> NoteRow {
        NoteRow {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_visibility_parses_labels_and_codes() {
        assert_eq!(Visibility::parse("PLC"), Visibility::Plc);
        assert_eq!(Visibility::parse("plc"), Visibility::Plc);
        assert_eq!(Visibility::parse(" ข้อเสนอ "), Visibility::Proposal);
        assert_eq!(Visibility::parse("proposal"), Visibility::Proposal);
        assert_eq!(Visibility::parse("ส่วนตัว"), Visibility::Private);
        assert_eq!(Visibility::parse("something-else"), Visibility::Private);
    }

    #[test]
    fn test_visibility_input_is_strict() {
        let v: Visibility = serde_json::from_value(serde_json::json!("PLC")).unwrap();
        assert_eq!(v, Visibility::Plc);
        assert!(serde_json::from_value::<Visibility>(serde_json::json!("public")).is_err());

        let patch: Result<NotePatch, _> =
            serde_json::from_value(serde_json::json!({ "visibility": "public" }));
        assert!(patch.is_err());
    }

    #[test]
    fn test_note_type_keeps_unknown_labels() {
        assert_eq!(NoteType::parse("การสอน"), NoteType::Teaching);
        assert_eq!(
            NoteType::parse("ประชุมผู้บริหาร"),
            NoteType::Other("ประชุมผู้บริหาร".to_string())
        );
        assert_eq!(NoteType::Other("x".into()).db_label(), "x");
    }

    #[test]
    fn test_derive_title_truncates_long_content() {
        let content = "ก".repeat(60);
        let title = derive_title(&content);
        assert_eq!(title.chars().count(), 51);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn test_derive_title_short_and_empty() {
        assert_eq!(derive_title("สั้น"), "สั้น");
        assert_eq!(derive_title("   "), UNTITLED_VOICE_NOTE);
    }

    #[test]
    fn test_row_with_legacy_transcript_only() {
        let mut legacy = row("7");
        legacy.transcript = Some("ประชุมเรื่องการวัดผล".to_string());
        let note = Note::from(legacy);
        assert_eq!(note.content, "ประชุมเรื่องการวัดผล");
        assert_eq!(note.title, "ประชุมเรื่องการวัดผล");
        assert_eq!(note.note_type, NoteType::Meeting);
        assert_eq!(note.visibility, Visibility::Private);
        assert_eq!(note.source, Source::Voice);
        assert!(note.tags.is_empty());
    }

    #[test]
    fn test_row_reflection_requires_all_lists() {
        let mut partial = row("1");
        partial.ai_reflection = Some(json!({ "keyPoints": ["a"], "questions": ["b"] }));
        assert!(Note::from(partial).reflection.is_none());

        let mut complete = row("2");
        complete.ai_reflection = Some(json!({
            "keyPoints": ["a"], "questions": ["b"], "suggestions": ["c"]
        }));
        let reflection = Note::from(complete).reflection.unwrap();
        assert_eq!(reflection.suggestions, vec!["c"]);
    }

    #[test]
    fn test_new_note_validation() {
        assert!(NewNote::default().validate().is_err());
        let titled = NewNote {
            title: Some("หัวข้อ".into()),
            ..Default::default()
        };
        assert!(titled.validate().is_ok());
    }

    #[test]
    fn test_new_note_dedupes_tags() {
        let draft = NewNote {
            content: "x".into(),
            tags: vec!["PLC".into(), " PLC ".into(), "การอ่าน".into(), "".into()],
            ..Default::default()
        };
        let note = draft.into_note("1".into(), Utc::now());
        assert_eq!(note.tags, vec!["PLC", "การอ่าน"]);
        assert_eq!(note.visibility, Visibility::Private);
    }

    #[test]
    fn test_patch_merge_keeps_disjoint_fields() {
        let mut first = NotePatch {
            title: Some("A".into()),
            ..Default::default()
        };
        first.merge(&NotePatch {
            tags: Some(vec!["t".into()]),
            ..Default::default()
        });
        assert_eq!(first.fields(), vec![NoteField::Title, NoteField::Tags]);

        first.forget(&[NoteField::Title]);
        assert_eq!(first.fields(), vec![NoteField::Tags]);
    }

    #[test]
    fn test_note_json_uses_camel_case() {
        let note = NewNote {
            content: "c".into(),
            ..Default::default()
        }
        .into_note("n1".into(), Utc::now());
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["type"], "meeting");
        assert_eq!(value["visibility"], "private");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("sharedGroupId").is_none());
    }
}
