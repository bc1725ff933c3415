//! Starting worker processes.
//!
//! [`WorkerLauncher`] hands the relay a pair of pipes to the worker plus a
//! [`WorkerReaper`] for its execution unit. [`ProcessLauncher`] runs each
//! job in its own OS process.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use futures::StreamExt;
use oneadif_core::JobId;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio_util::codec::{FramedRead, LinesCodec};

/// Worker-bound pipe (the worker's stdin).
pub type WorkerInput = Box<dyn AsyncWrite + Send + Unpin>;
/// Control-plane-bound pipe (the worker's stdout).
pub type WorkerOutput = Box<dyn AsyncRead + Send + Unpin>;

/// Longest worker log line forwarded to the control-plane log.
const MAX_LOG_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Failed to spawn worker {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Worker {0} pipe was not captured")]
    MissingPipe(&'static str),
}

/// Waits for, or forcibly stops, one worker.
#[async_trait]
pub trait WorkerReaper: Send {
    /// Wait for the worker to exit; returns its exit code when it has one.
    async fn wait(&mut self) -> std::io::Result<Option<i32>>;

    async fn kill(&mut self) -> std::io::Result<()>;
}

pub struct WorkerChannels {
    pub input: WorkerInput,
    pub output: WorkerOutput,
    pub reaper: Box<dyn WorkerReaper>,
}

#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    async fn launch(&self, job_id: &JobId) -> Result<WorkerChannels, LaunchError>;
}

/// Runs `oneadif-worker` as a child process per job.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, job_id: &JobId) -> Result<WorkerChannels, LaunchError> {
        // `kill_on_drop(true)` stops the worker if its relay goes away.
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let input = child.stdin.take().ok_or(LaunchError::MissingPipe("stdin"))?;
        let output = child.stdout.take().ok_or(LaunchError::MissingPipe("stdout"))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_logs(stderr, job_id.clone()));
        }

        tracing::debug!(job_id = %job_id, pid = ?child.id(), "Worker process started");
        Ok(WorkerChannels {
            input: Box::new(input),
            output: Box::new(output),
            reaper: Box::new(ChildReaper(child)),
        })
    }
}

struct ChildReaper(Child);

#[async_trait]
impl WorkerReaper for ChildReaper {
    async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        Ok(self.0.wait().await?.code())
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.0.kill().await
    }
}

/// Copy each worker stderr line into the control-plane log.
async fn forward_logs<R: AsyncRead + Unpin>(stderr: R, job_id: JobId) {
    let mut lines = FramedRead::new(stderr, LinesCodec::new_with_max_length(MAX_LOG_LINE_BYTES));
    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => tracing::info!(job_id = %job_id, "worker: {line}"),
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Unreadable worker log line");
                break;
            }
        }
    }
}
