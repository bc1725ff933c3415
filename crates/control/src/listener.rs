//! Unix-socket listener for trusted local callers.
//!
//! Each connection carries exactly one request and one response. The
//! accept loop wakes at least every `accept_poll` so shutdown is observed
//! promptly.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;

use crate::config::ControlConfig;
use crate::error::ControlError;
use crate::protocol::{read_message, write_message, ProtocolError, Request, Response};
use crate::service::UploadService;

#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub accept_poll: Duration,
    pub request_timeout: Duration,
    pub max_request_bytes: usize,
}

impl From<&ControlConfig> for ListenerSettings {
    fn from(config: &ControlConfig) -> Self {
        Self {
            accept_poll: config.accept_poll(),
            request_timeout: config.request_timeout(),
            max_request_bytes: config.max_request_bytes,
        }
    }
}

/// Bind `path`, replacing a socket file left behind by an earlier run.
pub fn bind(path: &Path) -> io::Result<UnixListener> {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed stale control socket"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    UnixListener::bind(path)
}

/// Accept connections until `shutdown` is cancelled.
pub async fn run(
    listener: UnixListener,
    service: Arc<UploadService>,
    settings: ListenerSettings,
    shutdown: CancellationToken,
) {
    tracing::info!("Control listener accepting requests");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = tokio::time::timeout(settings.accept_poll, listener.accept()) => match accepted {
                Err(_) => continue,
                Ok(Ok((stream, _addr))) => {
                    tokio::spawn(handle_connection(
                        stream,
                        Arc::clone(&service),
                        settings.clone(),
                    ));
                }
                Ok(Err(e)) => tracing::warn!(error = %e, "Accept failed"),
            }
        }
    }

    if let Ok(addr) = listener.local_addr() {
        if let Some(path) = addr.as_pathname() {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::debug!(error = %e, "Could not remove control socket");
            }
        }
    }
    tracing::info!("Control listener stopped");
}

async fn handle_connection(stream: UnixStream, service: Arc<UploadService>, settings: ListenerSettings) {
    let mut framed = Framed::new(
        stream,
        LinesCodec::new_with_max_length(settings.max_request_bytes),
    );

    let request = match tokio::time::timeout(settings.request_timeout, read_message::<Request, _>(&mut framed)).await {
        Ok(request) => request,
        Err(_) => Err(ProtocolError::Timeout),
    };

    let response = match request {
        Ok(request) => service.handle(request).await,
        Err(ProtocolError::Closed) => return,
        Err(e) => {
            let err = ControlError::InvalidRequest(e.to_string());
            tracing::warn!(error = %err, "Rejected control request");
            Response::Error(err.wire_message().to_string())
        }
    };

    if let Err(e) = write_message(&mut framed, &response).await {
        tracing::warn!(error = %e, "Failed to send control response");
    }
    let _ = SinkExt::<String>::close(&mut framed).await;
}
