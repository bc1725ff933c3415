//! Control-plane errors and the strings callers see for them.

use oneadif_core::{AccountId, JobId};
use oneadif_db::StoreError;

pub const UPLOAD_NOT_FOUND: &str = "Upload not found";
pub const NOT_CANCELLABLE: &str = "Upload cannot be cancelled";
pub const ACCOUNT_NOT_FOUND: &str = "Account not found";
pub const INVALID_REQUEST: &str = "Invalid request";
pub const INTERNAL_ERROR: &str = "Internal error";

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Upload {0} not found")]
    UploadNotFound(JobId),

    #[error("Upload {0} cannot be cancelled")]
    NotCancellable(JobId),

    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    /// The account names a provider this build cannot talk to.
    #[error("Account {account_id} uses unsupported provider '{provider}'")]
    UnsupportedProvider {
        account_id: AccountId,
        provider: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Status artifact error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Job {0} is already registered")]
    DuplicateJob(JobId),
}

impl ControlError {
    /// The message sent back over the control socket.
    pub fn wire_message(&self) -> &'static str {
        match self {
            Self::UploadNotFound(_) => UPLOAD_NOT_FOUND,
            Self::NotCancellable(_) => NOT_CANCELLABLE,
            Self::AccountNotFound(_) | Self::UnsupportedProvider { .. } => ACCOUNT_NOT_FOUND,
            Self::InvalidRequest(_) => INVALID_REQUEST,
            Self::Store(_) | Self::Io(_) | Self::DuplicateJob(_) => INTERNAL_ERROR,
        }
    }

    /// Whether the failure is on our side rather than the caller's.
    pub fn is_internal(&self) -> bool {
        self.wire_message() == INTERNAL_ERROR
    }
}
