//! External transfer client: one login and one file upload against a
//! provider's web interface.

pub mod body;
pub mod client;
pub mod dialect;
pub mod error;

pub use client::{ElogClient, ElogSession, ProgressFn, TransferClient};
pub use dialect::{Dialect, LoginEncoding, UploadEncoding};
pub use error::TransferError;
