use tokio_util::codec::LinesCodecError;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line codec error: {0}")]
    Codec(#[from] LinesCodecError),

    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),
}
