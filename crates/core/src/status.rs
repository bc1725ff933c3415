//! Status artifact: the 2-byte record a poller reads to follow a job.
//!
//! Byte 0 is the [`JobState`] code, byte 1 the progress percentage
//! (0-100). A missing file, or one shorter than two bytes, means no data
//! has been written yet.
//!
//! [`StatusStore`] writes each record to a sibling temp file in a single
//! write and renames it over the target, so readers only ever see a
//! complete record.

use std::io;
use std::path::{Path, PathBuf};

use crate::state::JobState;
use crate::types::JobId;

/// Size of an encoded status record in bytes.
pub const RECORD_LEN: usize = 2;

/// One decoded status artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRecord {
    pub state: JobState,
    /// Progress percentage 0-100.
    pub percent: u8,
}

impl StatusRecord {
    pub fn new(state: JobState, percent: u8) -> Self {
        Self {
            state,
            percent: percent.min(100),
        }
    }

    pub fn encode(&self) -> [u8; RECORD_LEN] {
        [self.state.code(), self.percent]
    }

    /// Decode the first two bytes of an artifact.
    ///
    /// Returns `None` for short input, an unknown state code, or a
    /// percentage above 100.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < RECORD_LEN {
            return None;
        }
        let state = JobState::from_code(bytes[0])?;
        let percent = bytes[1];
        if percent > 100 {
            return None;
        }
        Some(Self { state, percent })
    }
}

/// Directory of status artifacts, one file per job id.
#[derive(Debug, Clone)]
pub struct StatusStore {
    dir: PathBuf,
}

impl StatusStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the artifact directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Location of the artifact for `job_id`.
    pub fn path_for(&self, job_id: &JobId) -> PathBuf {
        self.dir.join(job_id.as_str())
    }

    /// Overwrite the artifact for `job_id` with `record`.
    pub async fn write(&self, job_id: &JobId, record: StatusRecord) -> io::Result<()> {
        let target = self.checked_path(job_id)?;
        let tmp = self.dir.join(format!(".{job_id}.tmp"));
        tokio::fs::write(&tmp, record.encode()).await?;
        tokio::fs::rename(&tmp, &target).await
    }

    /// Read the artifact for `job_id`; `None` when there is no data yet.
    pub async fn read(&self, job_id: &JobId) -> io::Result<Option<StatusRecord>> {
        let target = self.checked_path(job_id)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(StatusRecord::decode(&bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn checked_path(&self, job_id: &JobId) -> io::Result<PathBuf> {
        if !job_id.is_path_safe() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("job id '{job_id}' is not usable as a file name"),
            ));
        }
        Ok(self.path_for(job_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_state_code_then_percent() {
        let record = StatusRecord::new(JobState::Upload, 42);
        assert_eq!(record.encode(), [3, 42]);
    }

    #[test]
    fn percent_is_capped_at_100() {
        assert_eq!(StatusRecord::new(JobState::Success, 250).percent, 100);
    }

    #[test]
    fn decode_rejects_short_input() {
        assert_eq!(StatusRecord::decode(&[]), None);
        assert_eq!(StatusRecord::decode(&[1]), None);
    }

    #[test]
    fn decode_rejects_unknown_code_and_bad_percent() {
        assert_eq!(StatusRecord::decode(&[9, 0]), None);
        assert_eq!(StatusRecord::decode(&[3, 101]), None);
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        assert_eq!(
            StatusRecord::decode(&[6, 55, 0xff]),
            Some(StatusRecord::new(JobState::Cancelled, 55))
        );
    }

    #[tokio::test]
    async fn missing_artifact_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatusStore::new(dir.path());
        let id = JobId::generate();
        assert_eq!(store.read(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn short_artifact_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatusStore::new(dir.path());
        let id = JobId::generate();
        std::fs::write(store.path_for(&id), [1u8]).unwrap();
        assert_eq!(store.read(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatusStore::new(dir.path());
        let id = JobId::generate();

        store
            .write(&id, StatusRecord::new(JobState::Init, 0))
            .await
            .unwrap();
        store
            .write(&id, StatusRecord::new(JobState::Upload, 73))
            .await
            .unwrap();

        let raw = std::fs::read(store.path_for(&id)).unwrap();
        assert_eq!(raw, vec![3, 73]);
        assert_eq!(
            store.read(&id).await.unwrap(),
            Some(StatusRecord::new(JobState::Upload, 73))
        );
    }

    #[tokio::test]
    async fn write_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatusStore::new(dir.path());
        let id = JobId::generate();
        store
            .write(&id, StatusRecord::new(JobState::Login, 0))
            .await
            .unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![id.to_string()]);
    }

    #[tokio::test]
    async fn unsafe_ids_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatusStore::new(dir.path());
        let err = store
            .write(&JobId::from("../escape"), StatusRecord::new(JobState::Init, 0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn ensure_dir_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatusStore::new(dir.path().join("a").join("uploads"));
        store.ensure_dir().await.unwrap();
        assert!(store.dir().is_dir());
    }
}
