//! The record store interface consumed by the control plane.

use async_trait::async_trait;
use serde_json::Value;

use crate::schema;

/// A row as a JSON object keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Errors from a record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying database query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A table or column name is not a plain SQL identifier.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The table has no registered key column.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// A created row lacks its key column.
    #[error("Missing key column '{column}' for table {table}")]
    MissingKey { table: String, column: &'static str },

    /// A row with the same key already exists.
    #[error("Duplicate key {key} in table {table}")]
    Duplicate { table: String, key: String },

    /// A row could not be converted to or from its model.
    #[error("Row decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Minimal persistence interface: look up, insert, and patch rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the row of `table` whose key equals `key`.
    async fn get(&self, table: &str, key: &Value) -> Result<Option<Row>, StoreError>;

    /// Insert a row and return it as stored (including defaults).
    async fn create(&self, table: &str, fields: Row) -> Result<Row, StoreError>;

    /// Overwrite `fields` on the row with `key`. Returns `false` when no
    /// such row exists.
    async fn update(&self, table: &str, key: &Value, fields: Row) -> Result<bool, StoreError>;
}

/// Key column of `table`, or [`StoreError::UnknownTable`].
pub(crate) fn require_key_column(table: &str) -> Result<&'static str, StoreError> {
    schema::key_column(table).ok_or_else(|| StoreError::UnknownTable(table.to_string()))
}

/// Primary key column and its SQL type.
pub(crate) fn require_key(table: &str) -> Result<(&'static str, &'static str), StoreError> {
    let column = require_key_column(table)?;
    let ty = schema::key_type(table).ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
    Ok((column, ty))
}

/// Reject anything that is not `[a-z_][a-z0-9_]*`.
pub(crate) fn validate_identifier(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_lowercase() || first == '_')
                && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        None => false,
    };
    if valid && name.len() <= 63 {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

/// Text form of a key value, used for comparisons across key types.
pub(crate) fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
