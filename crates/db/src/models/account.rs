//! Account on an external logging service.

use oneadif_core::AccountId;
use serde::{Deserialize, Serialize};

/// A row from the `accounts` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountId,
    /// Owner login on this service (not the provider login).
    #[serde(default)]
    pub login: Option<String>,
    /// Provider identifier, e.g. `LoTW`.
    pub elog: String,
    /// Provider credential payload.
    pub login_data: serde_json::Value,
}
