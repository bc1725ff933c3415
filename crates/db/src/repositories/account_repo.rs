//! Repository for the `accounts` table.

use oneadif_core::AccountId;
use serde_json::Value;

use crate::models::account::Account;
use crate::schema::ACCOUNTS;
use crate::store::{RecordStore, StoreError};

/// Read access to service accounts and their stored credentials.
pub struct AccountRepo;

impl AccountRepo {
    /// Find an account by its ID.
    pub async fn find_by_id(
        store: &dyn RecordStore,
        account_id: AccountId,
    ) -> Result<Option<Account>, StoreError> {
        let Some(row) = store.get(ACCOUNTS, &Value::from(account_id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(Value::Object(row))?))
    }
}
