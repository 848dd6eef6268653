use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info, warn};

use crate::models::note::NoteRow;
use crate::notes::models::{Note, NotePatch};
use crate::notes::shapes::{
    dropped_fields, fit_to_shape, insert_payload, update_payload, PayloadShape, INSERT_SHAPES,
    UPDATE_SHAPES,
};
use crate::notes::{NoteStore, WriteReceipt};
use crate::store::payload::{push_value, ColumnValue, Payload};
use crate::store::StoreError;

/// Which rows a read returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    /// `deleted_at IS NULL`.
    LiveOnly,
    /// No soft-delete filtering, for deployments without `deleted_at`.
    Everything,
}

/// Raw access to the remote `notes` table.
#[async_trait]
pub trait NotesTable: Send + Sync {
    async fn select(&self, filter: RowFilter) -> Result<Vec<NoteRow>, StoreError>;

    /// Inserts one row and returns its id as text.
    async fn insert(&self, payload: &Payload) -> Result<String, StoreError>;

    /// Returns the number of rows affected.
    async fn update(&self, id: &str, payload: &Payload) -> Result<u64, StoreError>;
}

pub struct PgNotesTable {
    pool: PgPool,
}

impl PgNotesTable {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotesTable for PgNotesTable {
    async fn select(&self, filter: RowFilter) -> Result<Vec<NoteRow>, StoreError> {
        let sql = match filter {
            RowFilter::LiveOnly => {
                "SELECT *, id::text AS id_text FROM notes WHERE deleted_at IS NULL"
            }
            RowFilter::Everything => "SELECT *, id::text AS id_text FROM notes",
        };
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().filter_map(NoteRow::from_pg).collect())
    }

    async fn insert(&self, payload: &Payload) -> Result<String, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO notes (");
        for (i, column) in payload.column_names().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(column);
        }
        qb.push(") VALUES (");
        for (i, (_, value)) in payload.columns().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            push_value(&mut qb, value);
        }
        qb.push(") RETURNING id::text AS id_text");

        let row = qb.build().fetch_one(&self.pool).await?;
        Ok(row.try_get("id_text")?)
    }

    async fn update(&self, id: &str, payload: &Payload) -> Result<u64, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE notes SET ");
        for (i, (column, value)) in payload.columns().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(*column);
            qb.push(" = ");
            push_value(&mut qb, value);
        }
        qb.push(" WHERE id::text = ");
        qb.push_bind(id.to_string());

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

/// `NoteStore` over the remote table, narrowing payloads when the backend
/// lacks optional columns. Columns found missing stay excluded from later
/// writes, so a follow-up patch skips what the insert already tripped on.
pub struct RemoteNoteStore {
    table: Arc<dyn NotesTable>,
    absent: Mutex<Vec<String>>,
}

impl RemoteNoteStore {
    pub fn new(table: Arc<dyn NotesTable>) -> Self {
        Self {
            table,
            absent: Mutex::new(Vec::new()),
        }
    }

    fn absent_columns(&self) -> Vec<String> {
        self.absent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn mark_absent(&self, column: &str) {
        let mut absent = self.absent.lock().unwrap_or_else(|e| e.into_inner());
        if !absent.iter().any(|c| c == column) {
            absent.push(column.to_string());
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self::new(Arc::new(PgNotesTable::new(pool)))
    }

    /// Tries each shape in order. Returns the payload that was accepted.
    async fn write_narrowing<F, Fut, T>(
        &self,
        full: &Payload,
        shapes: &[PayloadShape],
        mut write: F,
    ) -> Result<(T, Payload), StoreError>
    where
        F: FnMut(Payload) -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        let mut missing = self.absent_columns();
        let mut last_error: Option<StoreError> = None;

        for shape in shapes {
            let Some(payload) = fit_to_shape(full, shape, &missing) else {
                debug!("Skipping {}: nothing left to write", shape.name);
                continue;
            };
            match write(payload.clone()).await {
                Ok(value) => return Ok((value, payload)),
                Err(StoreError::MissingColumn(column)) => {
                    warn!(
                        "Remote notes table has no '{column}' column; narrowing past {}",
                        shape.name
                    );
                    self.mark_absent(&column);
                    missing.push(column.clone());
                    last_error = Some(StoreError::MissingColumn(column));
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| StoreError::Rejected("no payload shape fits this write".into())))
    }
}

#[async_trait]
impl NoteStore for RemoteNoteStore {
    async fn list(&self) -> Result<Vec<Note>, StoreError> {
        let rows = match self.table.select(RowFilter::LiveOnly).await {
            Err(e) if e.missing_column() == Some("deleted_at") => {
                warn!("Remote notes table has no deleted_at; reading without soft-delete filter");
                self.table.select(RowFilter::Everything).await?
            }
            other => other?,
        };
        Ok(rows
            .into_iter()
            .map(Note::from)
            .filter(|note| !note.is_deleted())
            .collect())
    }

    async fn create(&self, note: &Note) -> Result<WriteReceipt, StoreError> {
        let full = insert_payload(note);
        let table = &self.table;
        let (id, sent) = self
            .write_narrowing(&full, INSERT_SHAPES, |payload| async move {
                table.insert(&payload).await
            })
            .await?;
        info!("Note {id} stored remotely");

        let dropped = dropped_fields(&full, &sent);
        if dropped.is_empty() {
            return Ok(WriteReceipt::complete(id));
        }

        // reattach what the narrowed insert left out now that the row exists
        debug!("Reattaching {:?} to note {id}", dropped);
        match self.update(&id, &note.patch_for(&dropped)).await {
            Ok(receipt) => Ok(WriteReceipt {
                id,
                dropped: receipt.dropped,
            }),
            Err(e) => {
                warn!("Follow-up patch for note {id} failed: {e}");
                Ok(WriteReceipt { id, dropped })
            }
        }
    }

    async fn update(&self, id: &str, patch: &NotePatch) -> Result<WriteReceipt, StoreError> {
        let full = update_payload(patch, Utc::now());
        if full.is_empty() {
            return Ok(WriteReceipt::complete(id));
        }
        let table = &self.table;
        let (affected, sent) = self
            .write_narrowing(&full, UPDATE_SHAPES, |payload| async move {
                table.update(id, &payload).await
            })
            .await?;
        if affected == 0 {
            return Err(StoreError::Rejected(format!("note {id} not found remotely")));
        }
        Ok(WriteReceipt {
            id: id.to_string(),
            dropped: dropped_fields(&full, &sent),
        })
    }

    async fn soft_delete(&self, id: &str) -> Result<(), StoreError> {
        let payload = Payload::new().with("deleted_at", ColumnValue::Timestamp(Utc::now()));
        match self.table.update(id, &payload).await? {
            0 => Err(StoreError::Rejected(format!("note {id} not found remotely"))),
            _ => {
                info!("Note {id} soft-deleted remotely");
                Ok(())
            }
        }
    }
}
