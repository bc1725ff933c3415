//! Upload worker: runs one job's login and transfer in its own process.
//!
//! The control plane starts one worker per job and talks to it over
//! stdin/stdout with the line protocol in [`oneadif_core::protocol`].

pub mod error;
pub mod job;
pub mod serve;

pub use error::WorkerError;
pub use job::run_job;
pub use serve::serve;
