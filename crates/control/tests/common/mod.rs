//! In-process workers and fixtures for the control-plane tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oneadif_control::launcher::{LaunchError, WorkerChannels, WorkerLauncher, WorkerReaper};
use oneadif_control::UploadService;
use oneadif_core::{JobId, StatusRecord, StatusStore, UploadFile};
use oneadif_db::schema::ACCOUNTS;
use oneadif_db::{MemoryRecordStore, RecordStore};
use oneadif_elog::{ProgressFn, TransferClient, TransferError};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const ACCOUNT_ID: i64 = 7;

// ---------------------------------------------------------------------------
// Scripted provider
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub enum Script {
    Succeed,
    RejectLogin,
    /// Login waits for the gate.
    HoldLogin(Arc<Notify>),
    /// Upload reports 37% and then waits for cancellation.
    HoldUpload,
    /// Upload reports 37% and then never returns, cancelled or not.
    StallUpload,
}

#[derive(Clone)]
pub struct ScriptedClient(pub Script);

#[async_trait]
impl TransferClient for ScriptedClient {
    type Session = ();

    async fn login(&self, _credentials: &Value) -> Result<(), TransferError> {
        match &self.0 {
            Script::RejectLogin => Err(TransferError::Authentication("bad password".into())),
            Script::HoldLogin(gate) => {
                gate.notified().await;
                Ok(())
            }
            Script::Succeed | Script::HoldUpload | Script::StallUpload => Ok(()),
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
        match &self.0 {
            Script::HoldUpload => {
                progress(0.37);
                cancel.cancelled().await;
                Err(TransferError::Cancelled)
            }
            Script::StallUpload => {
                progress(0.37);
                std::future::pending().await
            }
            _ => {
                progress(0.5);
                progress(1.0);
                Ok(true)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Launchers
// ---------------------------------------------------------------------------

/// Reaps a worker that runs as a task.
struct TaskReaper(JoinHandle<()>);

#[async_trait]
impl WorkerReaper for TaskReaper {
    async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        match (&mut self.0).await {
            Ok(()) => Ok(Some(0)),
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
        }
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.0.abort();
        Ok(())
    }
}

/// Runs the real worker loop in a task, wired up with in-memory pipes.
pub struct InProcessLauncher {
    script: Script,
    launched: AtomicUsize,
}

impl InProcessLauncher {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            launched: AtomicUsize::new(0),
        }
    }

    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerLauncher for InProcessLauncher {
    async fn launch(&self, _job_id: &JobId) -> Result<WorkerChannels, LaunchError> {
        self.launched.fetch_add(1, Ordering::SeqCst);
        let (input, worker_in) = tokio::io::duplex(1 << 20);
        let (worker_out, output) = tokio::io::duplex(1 << 20);
        let client = ScriptedClient(self.script.clone());

        let handle = tokio::spawn(async move {
            let _ = oneadif_worker::serve(worker_in, worker_out, move |_| client).await;
        });
        Ok(WorkerChannels {
            input: Box::new(input),
            output: Box::new(output),
            reaper: Box::new(TaskReaper(handle)),
        })
    }
}

/// A worker that reads the start command, prints fixed lines and exits.
pub struct RawLauncher {
    lines: Vec<String>,
}

impl RawLauncher {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }
}

#[async_trait]
impl WorkerLauncher for RawLauncher {
    async fn launch(&self, _job_id: &JobId) -> Result<WorkerChannels, LaunchError> {
        let (input, worker_in) = tokio::io::duplex(1 << 20);
        let (mut worker_out, output) = tokio::io::duplex(1 << 20);
        let lines = self.lines.clone();

        let handle = tokio::spawn(async move {
            let mut start = String::new();
            let _ = BufReader::new(worker_in).read_line(&mut start).await;
            for line in lines {
                let _ = worker_out.write_all(format!("{line}\n").as_bytes()).await;
            }
            let _ = worker_out.shutdown().await;
        });
        Ok(WorkerChannels {
            input: Box::new(input),
            output: Box::new(output),
            reaper: Box::new(TaskReaper(handle)),
        })
    }
}

pub struct BrokenLauncher;

#[async_trait]
impl WorkerLauncher for BrokenLauncher {
    async fn launch(&self, _job_id: &JobId) -> Result<WorkerChannels, LaunchError> {
        Err(LaunchError::MissingPipe("stdin"))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub struct Fixture {
    pub service: Arc<UploadService>,
    pub store: Arc<MemoryRecordStore>,
    pub status: StatusStore,
    _dir: tempfile::TempDir,
}

pub async fn fixture(launcher: Arc<dyn WorkerLauncher>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let status = StatusStore::new(dir.path().join("uploads"));
    status.ensure_dir().await.unwrap();

    let store = Arc::new(MemoryRecordStore::new());
    seed_account(&store, ACCOUNT_ID, "LoTW").await;
    seed_account(&store, 8, "QRZ.com").await;

    let service = Arc::new(UploadService::new(
        Arc::clone(&store) as Arc<dyn RecordStore>,
        launcher,
        status.clone(),
    ));
    Fixture {
        service,
        store,
        status,
        _dir: dir,
    }
}

pub async fn seed_account(store: &MemoryRecordStore, account_id: i64, elog: &str) {
    let row = json!({
        "account_id": account_id,
        "login": "ADMIN",
        "elog": elog,
        "login_data": {"login": "R7CL", "password": "secret"},
    });
    store
        .create(ACCOUNTS, row.as_object().cloned().unwrap())
        .await
        .unwrap();
}

pub fn adif_file() -> UploadFile {
    UploadFile::new("x.adi", "<CALL:5>RZ3DC<EOR>")
}

/// Poll the artifact until `done` holds, failing after five seconds.
pub async fn wait_for_status(
    status: &StatusStore,
    job_id: &JobId,
    done: impl Fn(StatusRecord) -> bool,
) -> StatusRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(record) = status.read(job_id).await.unwrap() {
            if done(record) {
                return record;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {job_id} never reached the expected status"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_for_terminal(status: &StatusStore, job_id: &JobId) -> StatusRecord {
    wait_for_status(status, job_id, |record| record.state.is_terminal()).await
}

/// Wait until the job's relay has removed its registry entry.
pub async fn wait_until_unregistered(service: &UploadService, job_id: &JobId) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while service.registry().state_of(job_id).await.is_some() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {job_id} stayed registered"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
