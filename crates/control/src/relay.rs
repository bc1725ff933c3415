//! Relay: the control-plane end of one worker's pipes.
//!
//! The relay sends the start command, forwards cancel requests from the
//! [`ConnectorHandle`], and applies the worker's events in order to the
//! registry, the record store and the status artifact. Events that would
//! break the job's walk are logged and dropped. Once a terminal state is
//! applied, or the worker's output ends without one (recorded as
//! `internal_error`), the worker is reaped and the registry entry removed.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use oneadif_core::protocol::{WorkerCommand, WorkerEvent, MAX_LINE_BYTES};
use oneadif_core::{JobId, JobSnapshot, JobSpec, JobState, StatusStore};
use oneadif_db::repositories::UploadRepo;
use oneadif_db::RecordStore;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

use crate::launcher::{WorkerChannels, WorkerReaper};
use crate::registry::JobRegistry;

/// How long a worker may take to exit after its terminal state.
pub const WORKER_EXIT_GRACE: Duration = Duration::from_secs(5);

/// Inbound side of a job's relay, kept in the registry.
#[derive(Debug, Clone)]
pub struct ConnectorHandle {
    commands: mpsc::UnboundedSender<WorkerCommand>,
}

impl ConnectorHandle {
    /// Queue a cancel message for the worker. Best effort; returns `false`
    /// if the relay has already stopped.
    pub fn forward_cancel(&self) -> bool {
        self.commands.send(WorkerCommand::Cancel).is_ok()
    }
}

/// Create a connector handle and the command stream its relay drains.
pub fn connector() -> (ConnectorHandle, mpsc::UnboundedReceiver<WorkerCommand>) {
    let (commands, rx) = mpsc::unbounded_channel();
    (ConnectorHandle { commands }, rx)
}

pub struct Relay {
    job_id: JobId,
    snapshot: JobSnapshot,
    registry: Arc<JobRegistry>,
    store: Arc<dyn RecordStore>,
    status: StatusStore,
}

impl Relay {
    pub fn new(
        job_id: JobId,
        registry: Arc<JobRegistry>,
        store: Arc<dyn RecordStore>,
        status: StatusStore,
    ) -> Self {
        Self {
            job_id,
            snapshot: JobSnapshot::new(),
            registry,
            store,
            status,
        }
    }

    /// Drive the job to completion and return its terminal state.
    pub async fn run(
        mut self,
        spec: JobSpec,
        channels: WorkerChannels,
        mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
    ) -> JobState {
        let WorkerChannels {
            input,
            output,
            mut reaper,
        } = channels;
        let mut to_worker = FramedWrite::new(input, LinesCodec::new());
        let mut from_worker =
            FramedRead::new(output, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

        let start = WorkerCommand::Start {
            job: Box::new(spec),
        };
        if let Err(e) = send_command(&mut to_worker, &start).await {
            tracing::error!(job_id = %self.job_id, error = %e, "Could not start worker");
        } else {
            loop {
                tokio::select! {
                    Some(command) = commands.recv() => {
                        tracing::info!(job_id = %self.job_id, "Forwarding cancel to worker");
                        if let Err(e) = send_command(&mut to_worker, &command).await {
                            tracing::warn!(job_id = %self.job_id, error = %e, "Worker input closed");
                        }
                    }
                    line = from_worker.next() => match line {
                        Some(Ok(line)) => {
                            if self.on_line(&line).await {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::error!(job_id = %self.job_id, error = %e, "Unreadable worker output");
                            break;
                        }
                        None => {
                            tracing::debug!(job_id = %self.job_id, "Worker output closed");
                            break;
                        }
                    }
                }
            }
        }

        let registered = self.registry.state_of(&self.job_id).await.is_some();
        if registered && !self.snapshot.state().is_terminal() {
            tracing::error!(
                job_id = %self.job_id,
                state = %self.snapshot.state(),
                "Worker stopped without a terminal state",
            );
            self.apply_state(JobState::InternalError).await;
        }

        // Closing stdin lets the worker's command reader finish.
        drop(to_worker);
        drop(from_worker);
        self.reap(reaper.as_mut()).await;

        let state = self.snapshot.state();
        self.registry.remove(&self.job_id).await;
        tracing::info!(job_id = %self.job_id, state = %state, "Job finished");
        state
    }

    /// Handle one worker line. Returns `true` once the job is terminal.
    async fn on_line(&mut self, line: &str) -> bool {
        match serde_json::from_str::<WorkerEvent>(line) {
            Ok(WorkerEvent::State { state }) => self.apply_state(state).await,
            Ok(WorkerEvent::Progress { fraction }) => {
                self.apply_progress(fraction).await;
                false
            }
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, error = %e, "Ignoring malformed worker event");
                false
            }
        }
    }

    async fn apply_state(&mut self, state: JobState) -> bool {
        if let Err(e) = self.snapshot.transition(state) {
            tracing::warn!(job_id = %self.job_id, error = %e, "Rejected worker state");
            return false;
        }
        tracing::info!(job_id = %self.job_id, state = %state, "Job state changed");

        // A missing entry means shutdown gave up on this job and recorded it.
        if !self.registry.update_state(&self.job_id, state).await {
            tracing::warn!(job_id = %self.job_id, state = %state, "Job no longer registered, state not recorded");
            return true;
        }
        let record = self.snapshot.status_record();
        match UploadRepo::update_state(self.store.as_ref(), &self.job_id, state, record.percent).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(job_id = %self.job_id, "Upload record missing"),
            Err(e) => tracing::error!(job_id = %self.job_id, error = %e, "Failed to persist job state"),
        }
        self.write_status().await;
        state.is_terminal()
    }

    async fn apply_progress(&mut self, fraction: f64) {
        match self.snapshot.record_progress(fraction) {
            Ok(true) => {
                tracing::debug!(job_id = %self.job_id, percent = self.snapshot.percent(), "Job progress");
                if self.registry.touch(&self.job_id).await {
                    self.write_status().await;
                }
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(job_id = %self.job_id, error = %e, "Rejected worker progress"),
        }
    }

    async fn write_status(&self) {
        if let Err(e) = self
            .status
            .write(&self.job_id, self.snapshot.status_record())
            .await
        {
            tracing::error!(job_id = %self.job_id, error = %e, "Failed to write status artifact");
        }
    }

    async fn reap(&self, reaper: &mut dyn WorkerReaper) {
        match tokio::time::timeout(WORKER_EXIT_GRACE, reaper.wait()).await {
            Ok(Ok(code)) => tracing::debug!(job_id = %self.job_id, code = ?code, "Worker exited"),
            Ok(Err(e)) => tracing::warn!(job_id = %self.job_id, error = %e, "Waiting for worker failed"),
            Err(_) => {
                tracing::warn!(job_id = %self.job_id, "Worker did not exit in time, killing it");
                if let Err(e) = reaper.kill().await {
                    tracing::error!(job_id = %self.job_id, error = %e, "Failed to kill worker");
                }
            }
        }
    }
}

async fn send_command<W>(
    to_worker: &mut FramedWrite<W, LinesCodec>,
    command: &WorkerCommand,
) -> Result<(), crate::protocol::ProtocolError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    to_worker.send(serde_json::to_string(command)?).await?;
    Ok(())
}
