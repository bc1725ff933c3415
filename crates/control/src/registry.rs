//! Process-wide table of active jobs.
//!
//! An entry exists from submission until its relay has observed a terminal
//! state and reaped the worker. All access goes through one mutex, so a
//! cancel lookup and the relay's state updates never interleave.

use std::collections::HashMap;

use chrono::Utc;
use oneadif_core::{JobId, JobState, Timestamp};
use tokio::sync::Mutex;

use crate::relay::ConnectorHandle;

/// Registry bookkeeping for one active job.
pub struct RegistryEntry {
    pub connector: ConnectorHandle,
    pub state: JobState,
    pub updated_at: Timestamp,
}

/// Result of [`JobRegistry::request_cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The cancel signal was handed to the job's relay.
    Forwarded,
    NotFound,
    /// The job already reached this terminal state.
    NotCancellable(JobState),
}

/// Thread-safe via an interior mutex; shared as `Arc<JobRegistry>`.
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, RegistryEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Register a job in state `init`. Returns `false` if the id is taken.
    pub async fn insert(&self, job_id: JobId, connector: ConnectorHandle) -> bool {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&job_id) {
            return false;
        }
        jobs.insert(
            job_id,
            RegistryEntry {
                connector,
                state: JobState::Init,
                updated_at: Utc::now(),
            },
        );
        true
    }

    /// Record a state change. Returns `false` for unknown jobs.
    pub async fn update_state(&self, job_id: &JobId, state: JobState) -> bool {
        match self.jobs.lock().await.get_mut(job_id) {
            Some(entry) => {
                entry.state = state;
                entry.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Bump the last-update time after a progress report. Returns `false`
    /// for unknown jobs.
    pub async fn touch(&self, job_id: &JobId) -> bool {
        match self.jobs.lock().await.get_mut(job_id) {
            Some(entry) => {
                entry.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Drop a job's entry, returning its last state.
    pub async fn remove(&self, job_id: &JobId) -> Option<JobState> {
        self.jobs.lock().await.remove(job_id).map(|entry| entry.state)
    }

    /// Remove every entry, returning each job's last state.
    pub async fn drain(&self) -> Vec<(JobId, JobState)> {
        self.jobs
            .lock()
            .await
            .drain()
            .map(|(job_id, entry)| (job_id, entry.state))
            .collect()
    }

    pub async fn state_of(&self, job_id: &JobId) -> Option<JobState> {
        self.jobs.lock().await.get(job_id).map(|entry| entry.state)
    }

    pub async fn updated_at(&self, job_id: &JobId) -> Option<Timestamp> {
        self.jobs.lock().await.get(job_id).map(|entry| entry.updated_at)
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    pub async fn job_ids(&self) -> Vec<JobId> {
        self.jobs.lock().await.keys().cloned().collect()
    }

    /// Forward a cancel to the job if its current state allows it.
    ///
    /// The state check and the forward happen under one lock.
    pub async fn request_cancel(&self, job_id: &JobId) -> CancelOutcome {
        let jobs = self.jobs.lock().await;
        let Some(entry) = jobs.get(job_id) else {
            return CancelOutcome::NotFound;
        };
        if !entry.state.is_cancellable() {
            return CancelOutcome::NotCancellable(entry.state);
        }
        if !entry.connector.forward_cancel() {
            tracing::debug!(job_id = %job_id, "Relay already stopped reading commands");
        }
        CancelOutcome::Forwarded
    }

    /// Forward a cancel to every cancellable job. Returns how many were signalled.
    pub async fn cancel_all(&self) -> usize {
        let jobs = self.jobs.lock().await;
        jobs.values()
            .filter(|entry| entry.state.is_cancellable())
            .filter(|entry| entry.connector.forward_cancel())
            .count()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
