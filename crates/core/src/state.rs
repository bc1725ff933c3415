//! Upload job state automaton.
//!
//! ```text
//! init -> login -> login_failed
//!               -> upload -> upload_failed
//!                         -> success
//! init | login | upload -> cancelled
//! init | login | upload -> internal_error
//! ```
//!
//! [`JobSnapshot`] pairs the current state with the transfer progress and
//! enforces the walk: terminal states are never left, no state is
//! revisited, and progress follows the reset/freeze rules of each state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::StatusRecord;

/// State of one upload job.
///
/// The discriminant is the state code stored in byte 0 of the status
/// artifact.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Init = 0,
    Login = 1,
    LoginFailed = 2,
    Upload = 3,
    UploadFailed = 4,
    Success = 5,
    Cancelled = 6,
    InternalError = 7,
}

impl JobState {
    pub const ALL: [JobState; 8] = [
        JobState::Init,
        JobState::Login,
        JobState::LoginFailed,
        JobState::Upload,
        JobState::UploadFailed,
        JobState::Success,
        JobState::Cancelled,
        JobState::InternalError,
    ];

    /// Status artifact state code.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Init => "init",
            JobState::Login => "login",
            JobState::LoginFailed => "login_failed",
            JobState::Upload => "upload",
            JobState::UploadFailed => "upload_failed",
            JobState::Success => "success",
            JobState::Cancelled => "cancelled",
            JobState::InternalError => "internal_error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::LoginFailed
                | JobState::UploadFailed
                | JobState::Success
                | JobState::Cancelled
                | JobState::InternalError
        )
    }

    /// A cancel request is only forwarded to jobs in these states.
    pub fn is_cancellable(self) -> bool {
        matches!(self, JobState::Init | JobState::Login | JobState::Upload)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Init, Login) => true,
            (Login, LoginFailed | Upload) => true,
            (Upload, UploadFailed | Success) => true,
            (Init | Login | Upload, Cancelled | InternalError) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("unknown job state '{s}'")))
    }
}

/// Rejected step in a job's walk.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("Invalid transition from {from} to {to}")]
    Invalid { from: JobState, to: JobState },

    #[error("Progress reported while in state {0}")]
    ProgressOutsideUpload(JobState),
}

/// Current state plus transfer progress of one job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobSnapshot {
    state: JobState,
    /// Fraction 0.0-1.0, meaningful only in `upload` and after it.
    progress: f64,
}

impl Default for JobSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl JobSnapshot {
    /// A freshly submitted job: `init`, progress 0.
    pub fn new() -> Self {
        Self {
            state: JobState::Init,
            progress: 0.0,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Progress as an integer percentage 0-100.
    pub fn percent(&self) -> u8 {
        fraction_to_percent(self.progress)
    }

    pub fn status_record(&self) -> StatusRecord {
        StatusRecord::new(self.state, self.percent())
    }

    /// Move to `next`, applying the progress rule of the new state.
    ///
    /// Progress resets to 0 on `login` and `upload`, becomes 1.0 on
    /// `success`, and is left as-is on every other terminal state.
    pub fn transition(&mut self, next: JobState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError::Invalid {
                from: self.state,
                to: next,
            });
        }

        match next {
            JobState::Login | JobState::Upload => self.progress = 0.0,
            JobState::Success => self.progress = 1.0,
            _ => {}
        }
        self.state = next;
        Ok(())
    }

    /// Record a transfer progress fraction.
    ///
    /// Values are clamped to 0.0-1.0 and never move progress backwards.
    /// Returns `true` when the reported percentage changed.
    pub fn record_progress(&mut self, fraction: f64) -> Result<bool, TransitionError> {
        if self.state != JobState::Upload {
            return Err(TransitionError::ProgressOutsideUpload(self.state));
        }

        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        if fraction <= self.progress {
            return Ok(false);
        }

        let before = self.percent();
        self.progress = fraction;
        Ok(self.percent() != before)
    }
}

/// Convert a 0.0-1.0 fraction into a 0-100 percentage.
pub fn fraction_to_percent(fraction: f64) -> u8 {
    if fraction.is_nan() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}
