//! Persisted upload job records.

use oneadif_core::{AccountId, JobId, JobState, Timestamp};
use serde::{Deserialize, Serialize};

/// A row from the `uploads` table.
///
/// Survives the job's registry entry so finished uploads stay auditable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecord {
    pub upload_id: JobId,
    pub account_id: AccountId,
    pub elog: String,
    pub file_name: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub state: JobState,
    /// Progress percentage 0-100.
    pub progress: i16,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a freshly submitted upload.
#[derive(Debug, Clone, Serialize)]
pub struct NewUpload {
    pub upload_id: JobId,
    pub account_id: AccountId,
    pub elog: String,
    pub file_name: String,
    pub params: serde_json::Value,
}
