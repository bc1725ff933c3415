//! Messages exchanged between the control plane and a worker.
//!
//! Each message travels as one line of JSON. The control plane sends a
//! single [`WorkerCommand::Start`] followed by any number of
//! [`WorkerCommand::Cancel`]; the worker answers with an ordered stream
//! of [`WorkerEvent`]s that ends with a terminal state.

use serde::{Deserialize, Serialize};

use crate::state::JobState;
use crate::upload::JobSpec;

/// Upper bound on one protocol line. File content travels inline.
pub const MAX_LINE_BYTES: usize = 64 * 1024 * 1024;

/// Control plane -> worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerCommand {
    Start { job: Box<JobSpec> },
    Cancel,
}

/// Worker -> control plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerEvent {
    State { state: JobState },
    /// Transfer progress as a fraction 0.0-1.0.
    Progress { fraction: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_wire_shape() {
        let line = serde_json::to_string(&WorkerCommand::Cancel).unwrap();
        assert_eq!(line, r#"{"type":"cancel"}"#);
    }

    #[test]
    fn event_wire_shapes() {
        let state = serde_json::to_string(&WorkerEvent::State {
            state: JobState::Upload,
        })
        .unwrap();
        assert_eq!(state, r#"{"type":"state","state":"upload"}"#);

        let progress: WorkerEvent =
            serde_json::from_str(r#"{"type":"progress","fraction":0.5}"#).unwrap();
        assert_eq!(progress, WorkerEvent::Progress { fraction: 0.5 });
    }

    #[test]
    fn start_carries_the_job() {
        let line = r#"{"type":"start","job":{"job_id":"j1","provider":"LoTW","credentials":{},"file":{"name":"a.adi","content":"x"},"params":{}}}"#;
        match serde_json::from_str::<WorkerCommand>(line).unwrap() {
            WorkerCommand::Start { job } => assert_eq!(job.job_id.as_str(), "j1"),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
