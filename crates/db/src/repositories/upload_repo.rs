//! Repository for the `uploads` table.

use chrono::Utc;
use oneadif_core::{JobId, JobState};
use serde_json::{json, Value};

use crate::models::upload::{NewUpload, UploadRecord};
use crate::schema::UPLOADS;
use crate::store::{RecordStore, Row, StoreError};

/// Provides create/read/state-update operations for upload jobs.
pub struct UploadRepo;

impl UploadRepo {
    /// Insert a new upload in state `init` with progress 0.
    pub async fn create(
        store: &dyn RecordStore,
        input: &NewUpload,
    ) -> Result<UploadRecord, StoreError> {
        let now = Utc::now();
        let mut fields = to_row(serde_json::to_value(input)?);
        fields.insert("state".into(), json!(JobState::Init));
        fields.insert("progress".into(), json!(0));
        fields.insert("created_at".into(), json!(now));
        fields.insert("updated_at".into(), json!(now));

        let row = store.create(UPLOADS, fields).await?;
        Ok(serde_json::from_value(Value::Object(row))?)
    }

    /// Find an upload by its job ID.
    pub async fn find_by_id(
        store: &dyn RecordStore,
        upload_id: &JobId,
    ) -> Result<Option<UploadRecord>, StoreError> {
        let Some(row) = store.get(UPLOADS, &json!(upload_id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(Value::Object(row))?))
    }

    /// Persist a state change together with the current progress.
    ///
    /// Returns `false` if the upload row does not exist.
    pub async fn update_state(
        store: &dyn RecordStore,
        upload_id: &JobId,
        state: JobState,
        progress_percent: u8,
    ) -> Result<bool, StoreError> {
        let fields = to_row(json!({
            "state": state,
            "progress": progress_percent,
            "updated_at": Utc::now(),
        }));
        store.update(UPLOADS, &json!(upload_id), fields).await
    }
}

fn to_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}
