//! In-process [`RecordStore`] for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::store::{key_text, require_key_column, RecordStore, Row, StoreError};

/// Rows held in memory, indexed by table then key text.
#[derive(Default)]
pub struct MemoryRecordStore {
    tables: RwLock<HashMap<String, HashMap<String, Row>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored in `table`.
    pub async fn count(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, table: &str, key: &Value) -> Result<Option<Row>, StoreError> {
        require_key_column(table)?;
        Ok(self
            .tables
            .read()
            .await
            .get(table)
            .and_then(|rows| rows.get(&key_text(key)))
            .cloned())
    }

    async fn create(&self, table: &str, fields: Row) -> Result<Row, StoreError> {
        let column = require_key_column(table)?;
        let key = fields
            .get(column)
            .map(key_text)
            .ok_or_else(|| StoreError::MissingKey {
                table: table.to_string(),
                column,
            })?;

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if rows.contains_key(&key) {
            return Err(StoreError::Duplicate {
                table: table.to_string(),
                key,
            });
        }
        rows.insert(key, fields.clone());
        Ok(fields)
    }

    async fn update(&self, table: &str, key: &Value, fields: Row) -> Result<bool, StoreError> {
        require_key_column(table)?;
        let mut tables = self.tables.write().await;
        let Some(row) = tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(&key_text(key)))
        else {
            return Ok(false);
        };
        row.extend(fields);
        Ok(true)
    }
}
