//! Worker side of the control-plane line protocol.

use futures::{SinkExt, StreamExt};
use oneadif_core::protocol::{WorkerCommand, WorkerEvent, MAX_LINE_BYTES};
use oneadif_core::{JobId, JobState, Provider};
use oneadif_elog::TransferClient;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;
use crate::job::run_job;

/// Read the start command from `reader`, run the job, and write its events
/// to `writer` until a terminal state has been sent.
///
/// A `cancel` line, or the control plane closing `reader`, cancels the
/// job. A panic inside the job is reported as `internal_error`.
pub async fn serve<R, W, C, F>(reader: R, writer: W, make_client: F) -> Result<JobState, WorkerError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
    C: TransferClient + 'static,
    F: FnOnce(Provider) -> C,
{
    let mut commands = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
    let mut out = FramedWrite::new(writer, LinesCodec::new());

    let spec = match commands.next().await {
        Some(line) => match serde_json::from_str::<WorkerCommand>(&line?)? {
            WorkerCommand::Start { job } => *job,
            WorkerCommand::Cancel => {
                return Err(WorkerError::Protocol("cancel received before start".into()))
            }
        },
        None => return Err(WorkerError::Protocol("input closed before start".into())),
    };
    let job_id = spec.job_id.clone();
    tracing::info!(job_id = %job_id, provider = %spec.provider, file = %spec.file.name, "Job received");

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(watch_commands(commands, cancel.clone(), job_id.clone()));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = make_client(spec.provider);
    let job = tokio::spawn({
        let cancel = cancel.clone();
        async move { run_job(&client, &spec, &cancel, tx).await }
    });

    let mut last = JobState::Init;
    while let Some(event) = rx.recv().await {
        if let WorkerEvent::State { state } = event {
            last = state;
        }
        if let Err(e) = send_event(&mut out, event).await {
            cancel.cancel();
            watcher.abort();
            return Err(e);
        }
    }

    let result = match job.await {
        Ok(state) => Ok(state),
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Job task aborted");
            if last.is_terminal() {
                Ok(last)
            } else {
                send_event(&mut out, WorkerEvent::State { state: JobState::InternalError })
                    .await
                    .map(|_| JobState::InternalError)
            }
        }
    };

    watcher.abort();
    if let Err(e) = SinkExt::<String>::close(&mut out).await {
        tracing::debug!(job_id = %job_id, error = %e, "Closing event stream failed");
    }
    result
}

async fn send_event<W: AsyncWrite + Unpin>(
    out: &mut FramedWrite<W, LinesCodec>,
    event: WorkerEvent,
) -> Result<(), WorkerError> {
    out.send(serde_json::to_string(&event)?).await?;
    Ok(())
}

/// Turn inbound `cancel` lines, or the end of input, into a cancel signal.
async fn watch_commands<R: AsyncRead + Unpin>(
    mut commands: FramedRead<R, LinesCodec>,
    cancel: CancellationToken,
    job_id: JobId,
) {
    while let Some(line) = commands.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Unreadable command line");
                break;
            }
        };
        match serde_json::from_str::<WorkerCommand>(&line) {
            Ok(WorkerCommand::Cancel) => {
                tracing::info!(job_id = %job_id, "Cancel requested");
                cancel.cancel();
            }
            Ok(WorkerCommand::Start { .. }) => {
                tracing::warn!(job_id = %job_id, "Ignoring repeated start command");
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Ignoring malformed command");
            }
        }
    }

    if !cancel.is_cancelled() {
        tracing::debug!(job_id = %job_id, "Command channel closed");
        cancel.cancel();
    }
}
