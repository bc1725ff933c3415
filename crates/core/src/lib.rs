//! Shared domain types for the oneadif upload control plane.
//!
//! - [`state`]: the upload job automaton and progress rules.
//! - [`status`]: the 2-byte status artifact and its on-disk store.
//! - [`protocol`]: line-delimited messages between control plane and worker.
//! - [`upload`]: file payloads and the job spec handed to a worker.

pub mod error;
pub mod protocol;
pub mod provider;
pub mod state;
pub mod status;
pub mod types;
pub mod upload;

pub use error::CoreError;
pub use provider::Provider;
pub use state::{JobSnapshot, JobState, TransitionError};
pub use status::{StatusRecord, StatusStore};
pub use types::{AccountId, JobId, Timestamp};
pub use upload::{JobSpec, UploadFile};
