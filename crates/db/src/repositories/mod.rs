//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&dyn RecordStore` as the first argument.

pub mod account_repo;
pub mod upload_repo;

pub use account_repo::AccountRepo;
pub use upload_repo::UploadRepo;
