//! Submit, cancel and health operations of the control plane.

use std::sync::Arc;
use std::time::Duration;

use oneadif_core::{JobId, JobSpec, JobState, Provider, StatusRecord, StatusStore};
use oneadif_db::models::upload::NewUpload;
use oneadif_db::repositories::{AccountRepo, UploadRepo};
use oneadif_db::RecordStore;
use serde_json::{json, Value};
use tokio_util::task::TaskTracker;

use crate::error::ControlError;
use crate::launcher::WorkerLauncher;
use crate::protocol::{Request, Response, UploadRequest};
use crate::registry::{CancelOutcome, JobRegistry};
use crate::relay::{self, Relay};

/// Owns the registry and the relay tasks of every active job.
pub struct UploadService {
    store: Arc<dyn RecordStore>,
    registry: Arc<JobRegistry>,
    launcher: Arc<dyn WorkerLauncher>,
    status: StatusStore,
    relays: TaskTracker,
}

impl UploadService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        launcher: Arc<dyn WorkerLauncher>,
        status: StatusStore,
    ) -> Self {
        Self {
            store,
            registry: Arc::new(JobRegistry::new()),
            launcher,
            status,
            relays: TaskTracker::new(),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn status_store(&self) -> &StatusStore {
        &self.status
    }

    /// Accept an upload and start its worker. Returns without waiting for
    /// login or transfer.
    ///
    /// Only an unresolvable account is rejected; nothing is registered or
    /// started in that case. A worker that cannot be launched leaves the
    /// job in `internal_error`.
    pub async fn submit(&self, request: UploadRequest) -> Result<JobId, ControlError> {
        let account = AccountRepo::find_by_id(self.store.as_ref(), request.account_id)
            .await?
            .ok_or(ControlError::AccountNotFound(request.account_id))?;
        let provider: Provider =
            account
                .elog
                .parse()
                .map_err(|_| ControlError::UnsupportedProvider {
                    account_id: account.account_id,
                    provider: account.elog.clone(),
                })?;

        let job_id = JobId::generate();
        let params = if request.params.is_null() {
            json!({})
        } else {
            request.params
        };

        UploadRepo::create(
            self.store.as_ref(),
            &NewUpload {
                upload_id: job_id.clone(),
                account_id: account.account_id,
                elog: account.elog.clone(),
                file_name: request.file.name.clone(),
                params: params.clone(),
            },
        )
        .await?;
        self.status
            .write(&job_id, StatusRecord::new(JobState::Init, 0))
            .await?;

        // The entry must exist before the worker does, so an immediate
        // cancel always finds it.
        let (connector, commands) = relay::connector();
        if !self.registry.insert(job_id.clone(), connector).await {
            return Err(ControlError::DuplicateJob(job_id));
        }

        let channels = match self.launcher.launch(&job_id).await {
            Ok(channels) => channels,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to launch worker");
                self.registry.remove(&job_id).await;
                self.record_internal_error(&job_id, 0).await;
                return Ok(job_id);
            }
        };

        let spec = JobSpec {
            job_id: job_id.clone(),
            provider,
            credentials: account.login_data,
            file: request.file,
            params,
        };
        let relay = Relay::new(
            job_id.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.store),
            self.status.clone(),
        );
        self.relays.spawn(relay.run(spec, channels, commands));

        tracing::info!(
            job_id = %job_id,
            account_id = account.account_id,
            provider = %provider,
            "Upload submitted",
        );
        Ok(job_id)
    }

    /// Record `internal_error` for a job no relay will finish.
    async fn record_internal_error(&self, job_id: &JobId, percent: u8) {
        if let Err(e) =
            UploadRepo::update_state(self.store.as_ref(), job_id, JobState::InternalError, percent)
                .await
        {
            tracing::error!(job_id = %job_id, error = %e, "Failed to persist job state");
        }
        if let Err(e) = self
            .status
            .write(job_id, StatusRecord::new(JobState::InternalError, percent))
            .await
        {
            tracing::error!(job_id = %job_id, error = %e, "Failed to write status artifact");
        }
    }

    /// Ask a running job to stop. Does not wait for it to do so.
    pub async fn cancel(&self, job_id: &JobId) -> Result<(), ControlError> {
        match self.registry.request_cancel(job_id).await {
            CancelOutcome::Forwarded => {
                tracing::info!(job_id = %job_id, "Cancel forwarded");
                Ok(())
            }
            CancelOutcome::NotCancellable(_) => Err(ControlError::NotCancellable(job_id.clone())),
            CancelOutcome::NotFound => {
                match UploadRepo::find_by_id(self.store.as_ref(), job_id).await? {
                    Some(record) if record.state.is_terminal() => {
                        Err(ControlError::NotCancellable(job_id.clone()))
                    }
                    _ => Err(ControlError::UploadNotFound(job_id.clone())),
                }
            }
        }
    }

    /// Liveness check: returns its input.
    pub fn health(&self, payload: Value) -> Value {
        payload
    }

    /// Dispatch one control-plane request.
    pub async fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::Upload(upload) => self.submit(upload).await.map(|id| json!(id)),
            Request::Cancel(job_id) => self.cancel(&job_id).await.map(|()| json!("ok")),
            Request::Test(payload) => Ok(self.health(payload)),
        };

        match result {
            Ok(value) => Response::Ok(value),
            Err(e) => {
                if e.is_internal() {
                    tracing::error!(error = %e, "Request failed");
                } else {
                    tracing::info!(error = %e, "Request rejected");
                }
                Response::Error(e.wire_message().to_string())
            }
        }
    }

    /// Cancel every active job and wait up to `timeout` for the relays.
    ///
    /// Jobs still running afterwards are recorded as `internal_error` with
    /// their last progress; their workers are killed when the handles drop.
    pub async fn shutdown(&self, timeout: Duration) {
        self.relays.close();
        let signalled = self.registry.cancel_all().await;
        tracing::info!(signalled, "Cancelling active uploads");

        if tokio::time::timeout(timeout, self.relays.wait()).await.is_ok() {
            return;
        }

        let abandoned = self.registry.drain().await;
        tracing::warn!(
            remaining = abandoned.len(),
            "Timed out waiting for uploads to stop",
        );
        for (job_id, state) in abandoned {
            if state.is_terminal() {
                continue;
            }
            let percent = match self.status.read(&job_id).await {
                Ok(Some(record)) => record.percent,
                Ok(None) => 0,
                Err(e) => {
                    tracing::warn!(job_id = %job_id, error = %e, "Could not read last progress");
                    0
                }
            };
            tracing::error!(job_id = %job_id, state = %state, "Upload abandoned at shutdown");
            self.record_internal_error(&job_id, percent).await;
        }
    }
}
