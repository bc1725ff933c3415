//! Upload control plane.
//!
//! Accepts submit/cancel/health requests on a local socket, runs each
//! upload in its own worker process, and relays the worker's state to the
//! job registry, the record store and the job's status artifact.

pub mod client;
pub mod config;
pub mod error;
pub mod launcher;
pub mod listener;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod service;

pub use client::ControlClient;
pub use config::ControlConfig;
pub use error::ControlError;
pub use launcher::{LaunchError, ProcessLauncher, WorkerLauncher};
pub use registry::JobRegistry;
pub use service::UploadService;
