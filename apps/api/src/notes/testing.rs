//! In-memory stand-in for the remote `notes` table.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::models::note::NoteRow;
use crate::notes::remote::{NotesTable, RowFilter};
use crate::store::payload::{ColumnValue, Payload};
use crate::store::StoreError;

/// Behaves like a Postgres `notes` table that may lack some columns and may
/// be unreachable.
pub struct FakeNotesTable {
    rows: Mutex<Vec<NoteRow>>,
    missing: HashSet<String>,
    offline: AtomicBool,
    reject_updates: AtomicBool,
    next_id: AtomicU64,
}

impl Default for FakeNotesTable {
    fn default() -> Self {
        Self::without_columns(&[])
    }
}

impl FakeNotesTable {
    pub fn without_columns(columns: &[&str]) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            missing: columns.iter().map(|c| c.to_string()).collect(),
            offline: AtomicBool::new(false),
            reject_updates: AtomicBool::new(false),
            next_id: AtomicU64::new(100),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Simulates a permission failure on every UPDATE.
    pub fn set_reject_updates(&self, reject: bool) {
        self.reject_updates.store(reject, Ordering::SeqCst);
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn row(&self, id: &str) -> Option<NoteRow> {
        self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }

    /// Inserts a row directly, as another client would.
    pub fn seed(&self, row: NoteRow) {
        self.rows.lock().unwrap().push(row);
    }

    fn check(&self, payload: &Payload) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        match payload.column_names().find(|c| self.missing.contains(*c)) {
            Some(column) => Err(StoreError::MissingColumn(column.to_string())),
            None => Ok(()),
        }
    }
}

fn apply(row: &mut NoteRow, payload: &Payload) {
    for (column, value) in payload.columns() {
        match (*column, value) {
            ("title", ColumnValue::Text(v)) => row.title = Some(v.clone()),
            ("content", ColumnValue::Text(v)) => row.content = Some(v.clone()),
            ("transcript", ColumnValue::Text(v)) => row.transcript = Some(v.clone()),
            ("type", ColumnValue::Text(v)) => row.note_type = Some(v.clone()),
            ("visibility", ColumnValue::Text(v)) => row.visibility = Some(v.clone()),
            ("source", ColumnValue::Text(v)) => row.source = Some(v.clone()),
            ("shared_to_plc_id", ColumnValue::Text(v)) => row.shared_to_plc_id = Some(v.clone()),
            ("user_id", ColumnValue::Text(v)) => row.user_id = Some(v.clone()),
            ("tags", ColumnValue::TextArray(v)) => row.tags = Some(v.clone()),
            ("ai_reflection", ColumnValue::Json(v)) => row.ai_reflection = Some(v.clone()),
            ("deleted_at", ColumnValue::Timestamp(v)) => row.deleted_at = Some(*v),
            _ => {}
        }
    }
}

#[async_trait]
impl NotesTable for FakeNotesTable {
    async fn select(&self, filter: RowFilter) -> Result<Vec<NoteRow>, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        if filter == RowFilter::LiveOnly && self.missing.contains("deleted_at") {
            return Err(StoreError::MissingColumn("deleted_at".into()));
        }
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|r| filter == RowFilter::Everything || r.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn insert(&self, payload: &Payload) -> Result<String, StoreError> {
        self.check(payload)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let mut row = NoteRow {
            id: id.clone(),
            created_at: Some(Utc::now()),
            ..Default::default()
        };
        apply(&mut row, payload);
        self.rows.lock().unwrap().push(row);
        Ok(id)
    }

    async fn update(&self, id: &str, payload: &Payload) -> Result<u64, StoreError> {
        self.check(payload)?;
        if self.reject_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("permission denied for table notes".into()));
        }
        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for row in rows.iter_mut().filter(|r| r.id == id) {
            apply(row, payload);
            affected += 1;
        }
        Ok(affected)
    }
}
