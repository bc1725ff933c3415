//! Control-plane request/response messages.
//!
//! One newline-terminated JSON request per connection, answered by exactly
//! one JSON response line, after which the connection is closed.

use futures::{SinkExt, StreamExt};
use oneadif_core::{AccountId, JobId, UploadFile};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

/// A request from a trusted caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "payload", rename_all = "lowercase")]
pub enum Request {
    /// Submit a file for upload; answered with the new job id.
    Upload(UploadRequest),
    /// Cancel a running job; answered with `"ok"`.
    Cancel(JobId),
    /// Liveness check; the payload is echoed back.
    Test(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub account_id: AccountId,
    pub file: UploadFile,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Response {
    Ok(Value),
    Error(String),
}

impl Response {
    pub fn into_result(self) -> Result<Value, ProtocolError> {
        match self {
            Response::Ok(value) => Ok(value),
            Response::Error(message) => Err(ProtocolError::Remote(message)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line codec error: {0}")]
    Codec(#[from] LinesCodecError),

    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed before a message arrived")]
    Closed,

    #[error("Timed out waiting for a message")]
    Timeout,

    /// The control plane answered with an error string.
    #[error("{0}")]
    Remote(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(Value),
}

/// Read one JSON line from `framed`.
pub async fn read_message<T, S>(framed: &mut Framed<S, LinesCodec>) -> Result<T, ProtocolError>
where
    T: DeserializeOwned,
    S: AsyncRead + AsyncWrite + Unpin,
{
    let line = framed.next().await.ok_or(ProtocolError::Closed)??;
    Ok(serde_json::from_str(&line)?)
}

/// Write `message` to `framed` as one JSON line.
pub async fn write_message<T, S>(
    framed: &mut Framed<S, LinesCodec>,
    message: &T,
) -> Result<(), ProtocolError>
where
    T: Serialize,
    S: AsyncRead + AsyncWrite + Unpin,
{
    framed.send(serde_json::to_string(message)?).await?;
    Ok(())
}
