//! The login/transfer walk of a single job.
//!
//! Cancellation is cooperative. The token is checked before login, after
//! login, and by the transfer client before every body chunk.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use oneadif_core::protocol::WorkerEvent;
use oneadif_core::state::fraction_to_percent;
use oneadif_core::{JobId, JobSnapshot, JobSpec, JobState, TransitionError};
use oneadif_elog::{ProgressFn, TransferClient, TransferError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Emits state and progress events while tracking the job's own walk.
struct Reporter {
    job_id: JobId,
    snapshot: JobSnapshot,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl Reporter {
    fn enter(&mut self, next: JobState) -> Result<(), TransitionError> {
        self.snapshot.transition(next)?;
        tracing::info!(job_id = %self.job_id, state = %next, "Job state changed");
        // The receiver only goes away when the worker is shutting down.
        let _ = self.events.send(WorkerEvent::State { state: next });
        Ok(())
    }

    /// Progress callback that only emits when the whole percentage grows.
    fn progress_fn(&self) -> ProgressFn {
        let events = self.events.clone();
        let job_id = self.job_id.clone();
        let last = Arc::new(AtomicU8::new(0));
        Arc::new(move |fraction| {
            let percent = fraction_to_percent(fraction);
            if last.fetch_max(percent, Ordering::Relaxed) < percent {
                tracing::debug!(job_id = %job_id, percent, "Upload progress");
                let _ = events.send(WorkerEvent::Progress { fraction });
            }
        })
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), TransferError> {
    if cancel.is_cancelled() {
        return Err(TransferError::Cancelled);
    }
    Ok(())
}

fn fault(e: TransitionError) -> TransferError {
    TransferError::Fault(e.to_string())
}

/// Run `spec` to a terminal state, emitting every transition on `events`.
///
/// Never fails: provider errors end in `login_failed`/`upload_failed`,
/// cancellation in `cancelled`, anything else in `internal_error`.
pub async fn run_job<C: TransferClient>(
    client: &C,
    spec: &JobSpec,
    cancel: &CancellationToken,
    events: mpsc::UnboundedSender<WorkerEvent>,
) -> JobState {
    let mut reporter = Reporter {
        job_id: spec.job_id.clone(),
        snapshot: JobSnapshot::new(),
        events,
    };

    let terminal = match drive(client, spec, cancel, &mut reporter).await {
        Ok(state) => state,
        Err(TransferError::Cancelled) => JobState::Cancelled,
        Err(e) => {
            tracing::error!(job_id = %spec.job_id, error = %e, "Upload job fault");
            JobState::InternalError
        }
    };

    if let Err(e) = reporter.enter(terminal) {
        tracing::error!(job_id = %spec.job_id, error = %e, "Could not record terminal state");
    }
    reporter.snapshot.state()
}

async fn drive<C: TransferClient>(
    client: &C,
    spec: &JobSpec,
    cancel: &CancellationToken,
    reporter: &mut Reporter,
) -> Result<JobState, TransferError> {
    checkpoint(cancel)?;
    reporter.enter(JobState::Login).map_err(fault)?;

    let session = match client.login(&spec.credentials).await {
        Ok(session) => session,
        Err(e @ (TransferError::Cancelled | TransferError::Fault(_))) => return Err(e),
        Err(e) => {
            tracing::warn!(job_id = %spec.job_id, provider = %spec.provider, error = %e, "Login failed");
            return Ok(JobState::LoginFailed);
        }
    };

    checkpoint(cancel)?;
    reporter.enter(JobState::Upload).map_err(fault)?;

    let progress = reporter.progress_fn();
    match client
        .upload(&session, &spec.file, &spec.params, progress, cancel)
        .await
    {
        Ok(true) => Ok(JobState::Success),
        Ok(false) => Ok(JobState::UploadFailed),
        Err(e @ (TransferError::Cancelled | TransferError::Fault(_))) => Err(e),
        Err(e) => {
            tracing::warn!(job_id = %spec.job_id, provider = %spec.provider, error = %e, "Upload failed");
            Ok(JobState::UploadFailed)
        }
    }
}
