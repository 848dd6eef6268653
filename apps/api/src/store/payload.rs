use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

/// A single value bound into an INSERT or UPDATE statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(String),
    TextArray(Vec<String>),
    Json(serde_json::Value),
    Timestamp(DateTime<Utc>),
}

/// An ordered set of `column = value` pairs for one write.
///
/// Column names are always `'static` identifiers chosen by this crate, never
/// caller input, so they are safe to splice into SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    columns: Vec<(&'static str, ColumnValue)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &'static str, value: ColumnValue) -> Self {
        self.set(column, value);
        self
    }

    /// Sets a column, replacing an earlier value for the same column.
    pub fn set(&mut self, column: &'static str, value: ColumnValue) {
        match self.columns.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &(&'static str, ColumnValue)> {
        self.columns.iter()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|(c, _)| *c)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|(c, _)| *c == column)
    }

    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Keeps only the columns accepted by `keep`.
    pub fn narrowed(&self, keep: impl Fn(&str) -> bool) -> Payload {
        Payload {
            columns: self
                .columns
                .iter()
                .filter(|(c, _)| keep(c))
                .cloned()
                .collect(),
        }
    }
}

/// Appends a bound placeholder for `value`.
pub fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &ColumnValue) {
    match value {
        ColumnValue::Text(text) => {
            qb.push_bind(text.clone());
        }
        ColumnValue::TextArray(items) => {
            qb.push_bind(items.clone());
        }
        ColumnValue::Json(json) => {
            qb.push_bind(json.clone());
        }
        ColumnValue::Timestamp(at) => {
            qb.push_bind(*at);
        }
    }
}
