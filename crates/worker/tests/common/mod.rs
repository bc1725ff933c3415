//! Scripted transfer client shared by the worker tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use oneadif_core::protocol::WorkerEvent;
use oneadif_core::{JobId, JobSpec, JobState, Provider, UploadFile};
use oneadif_elog::{ProgressFn, TransferClient, TransferError};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub enum Login {
    Ok,
    Rejected,
    Unreachable,
    Fault,
    Panic,
    /// Succeeds once the gate is notified.
    Gated(Arc<Notify>),
}

#[derive(Clone)]
pub enum Upload {
    Accept,
    Refuse,
    Unreachable,
    /// Reports the given fractions, then accepts.
    Progress(Vec<f64>),
    /// Reports some progress, then waits for the cancel token.
    UntilCancelled,
}

#[derive(Clone)]
pub struct ScriptedClient {
    pub login: Login,
    pub upload: Upload,
}

impl ScriptedClient {
    pub fn new(login: Login, upload: Upload) -> Self {
        Self { login, upload }
    }
}

#[async_trait]
impl TransferClient for ScriptedClient {
    type Session = ();

    async fn login(&self, _credentials: &Value) -> Result<(), TransferError> {
        match &self.login {
            Login::Ok => Ok(()),
            Login::Rejected => Err(TransferError::Authentication("bad password".into())),
            Login::Unreachable => Err(TransferError::HttpStatus(503)),
            Login::Fault => Err(TransferError::Fault("unexpected login page".into())),
            Login::Panic => panic!("provider SDK blew up"),
            Login::Gated(gate) => {
                gate.notified().await;
                Ok(())
            }
        }
    }

    async fn upload(
        &self,
        _session: &(),
        _file: &UploadFile,
        _params: &Value,
        progress: ProgressFn,
        cancel: &CancellationToken,
    ) -> Result<bool, TransferError> {
        match &self.upload {
            Upload::Accept => {
                progress(0.25);
                progress(0.5);
                progress(1.0);
                Ok(true)
            }
            Upload::Refuse => {
                progress(0.3);
                Ok(false)
            }
            Upload::Unreachable => Err(TransferError::HttpStatus(502)),
            Upload::Progress(steps) => {
                for step in steps {
                    progress(*step);
                }
                Ok(true)
            }
            Upload::UntilCancelled => {
                progress(0.4);
                cancel.cancelled().await;
                Err(TransferError::Cancelled)
            }
        }
    }
}

pub fn job_spec() -> JobSpec {
    JobSpec {
        job_id: JobId::generate(),
        provider: Provider::Lotw,
        credentials: json!({"login": "R7CL", "password": "secret"}),
        file: UploadFile::new("x.adi", "<CALL:5>RZ3DC<EOR>"),
        params: json!({}),
    }
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<WorkerEvent>) -> Vec<WorkerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn states(events: &[WorkerEvent]) -> Vec<JobState> {
    events
        .iter()
        .filter_map(|event| match event {
            WorkerEvent::State { state } => Some(*state),
            WorkerEvent::Progress { .. } => None,
        })
        .collect()
}

pub fn fractions(events: &[WorkerEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|event| match event {
            WorkerEvent::Progress { fraction } => Some(*fraction),
            WorkerEvent::State { .. } => None,
        })
        .collect()
}
