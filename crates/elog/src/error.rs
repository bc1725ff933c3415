//! Failure taxonomy of a provider transfer.

/// Errors raised by [`TransferClient`](crate::TransferClient) calls.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status code.
    #[error("Provider returned HTTP {0}")]
    HttpStatus(u16),

    /// The provider rejected the credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A cancel request was observed at a checkpoint.
    #[error("Transfer cancelled")]
    Cancelled,

    /// Anything else: malformed payloads, unexpected provider responses.
    #[error("Transfer fault: {0}")]
    Fault(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_http_status() {
        assert_eq!(TransferError::HttpStatus(502).to_string(), "Provider returned HTTP 502");
    }
}
