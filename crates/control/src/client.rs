//! Client for trusted callers of the control socket.

use std::path::PathBuf;

use oneadif_core::{AccountId, JobId, UploadFile};
use serde_json::Value;
use tokio::net::UnixStream;
use tokio_util::codec::{Framed, LinesCodec};

use crate::protocol::{read_message, write_message, ProtocolError, Request, Response, UploadRequest};

/// Opens one connection per request.
#[derive(Debug, Clone)]
pub struct ControlClient {
    socket_path: PathBuf,
}

impl ControlClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Submit an upload; returns the job id to poll.
    pub async fn submit(
        &self,
        account_id: AccountId,
        file: UploadFile,
        params: Value,
    ) -> Result<JobId, ProtocolError> {
        let value = self
            .call(&Request::Upload(UploadRequest {
                account_id,
                file,
                params,
            }))
            .await?;
        match value {
            Value::String(id) => Ok(JobId::from(id)),
            other => Err(ProtocolError::UnexpectedResponse(other)),
        }
    }

    pub async fn cancel(&self, job_id: &JobId) -> Result<(), ProtocolError> {
        match self.call(&Request::Cancel(job_id.clone())).await? {
            Value::String(s) if s == "ok" => Ok(()),
            other => Err(ProtocolError::UnexpectedResponse(other)),
        }
    }

    /// Round-trip `payload` through the control plane.
    pub async fn health(&self, payload: Value) -> Result<Value, ProtocolError> {
        self.call(&Request::Test(payload)).await
    }

    async fn call(&self, request: &Request) -> Result<Value, ProtocolError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let mut framed = Framed::new(stream, LinesCodec::new());
        write_message(&mut framed, request).await?;
        read_message::<Response, _>(&mut framed).await?.into_result()
    }
}
