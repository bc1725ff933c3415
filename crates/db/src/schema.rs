//! Table names and key columns known to the record store.

/// Accounts on external services, with their stored credentials.
pub const ACCOUNTS: &str = "accounts";

/// Persisted upload job records.
pub const UPLOADS: &str = "uploads";

/// Primary key column of a known table.
pub fn key_column(table: &str) -> Option<&'static str> {
    match table {
        ACCOUNTS => Some("account_id"),
        UPLOADS => Some("upload_id"),
        _ => None,
    }
}

/// SQL type of a known table's primary key, used to cast bound keys.
pub fn key_type(table: &str) -> Option<&'static str> {
    match table {
        ACCOUNTS => Some("BIGINT"),
        UPLOADS => Some("TEXT"),
        _ => None,
    }
}
