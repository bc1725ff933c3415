//! PostgreSQL-backed [`RecordStore`].
//!
//! Rows cross the boundary as JSONB: reads use `to_jsonb(t)`, writes go
//! through `jsonb_populate_record` so column types are taken from the
//! table definition. Table and column names are validated as plain
//! identifiers before they are interpolated into SQL.

use async_trait::async_trait;
use serde_json::Value;

use crate::store::{
    key_text, require_key, require_key_column, validate_identifier, RecordStore, Row, StoreError,
};
use crate::DbPool;

/// Record store over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: DbPool,
}

impl PgRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn get(&self, table: &str, key: &Value) -> Result<Option<Row>, StoreError> {
        let query = select_sql(table)?;
        let row = sqlx::query_scalar::<_, Value>(&query)
            .bind(key_text(key))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(into_row))
    }

    async fn create(&self, table: &str, fields: Row) -> Result<Row, StoreError> {
        let columns: Vec<&str> = fields.keys().map(String::as_str).collect();
        let query = insert_sql(table, &columns)?;
        let row = sqlx::query_scalar::<_, Value>(&query)
            .bind(Value::Object(fields))
            .fetch_one(&self.pool)
            .await?;
        Ok(into_row(row).unwrap_or_default())
    }

    async fn update(&self, table: &str, key: &Value, fields: Row) -> Result<bool, StoreError> {
        let columns: Vec<&str> = fields.keys().map(String::as_str).collect();
        let query = update_sql(table, &columns)?;
        let result = sqlx::query(&query)
            .bind(key_text(key))
            .bind(Value::Object(fields))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn into_row(value: Value) -> Option<Row> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn select_sql(table: &str) -> Result<String, StoreError> {
    validate_identifier(table)?;
    let (key, ty) = require_key(table)?;
    Ok(format!(
        "SELECT to_jsonb(t) FROM {table} t WHERE t.{key} = $1::{ty}"
    ))
}

fn insert_sql(table: &str, columns: &[&str]) -> Result<String, StoreError> {
    validate_identifier(table)?;
    let key = require_key_column(table)?;
    if !columns.contains(&key) {
        return Err(StoreError::MissingKey {
            table: table.to_string(),
            column: key,
        });
    }
    for column in columns {
        validate_identifier(column)?;
    }
    let list = columns.join(", ");
    Ok(format!(
        "INSERT INTO {table} ({list}) \
         SELECT {list} FROM jsonb_populate_record(NULL::{table}, $1) \
         RETURNING to_jsonb({table}.*)"
    ))
}

fn update_sql(table: &str, columns: &[&str]) -> Result<String, StoreError> {
    validate_identifier(table)?;
    let (key, ty) = require_key(table)?;
    if columns.is_empty() {
        return Err(StoreError::InvalidIdentifier(String::new()));
    }
    let mut assignments = Vec::with_capacity(columns.len());
    for column in columns {
        validate_identifier(column)?;
        assignments.push(format!("{column} = r.{column}"));
    }
    Ok(format!(
        "UPDATE {table} AS t SET {} \
         FROM jsonb_populate_record(NULL::{table}, $2) AS r \
         WHERE t.{key} = $1::{ty}",
        assignments.join(", ")
    ))
}
