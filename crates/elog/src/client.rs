//! The `{login, upload}` capability and its HTTP implementation.

use std::sync::Arc;

use async_trait::async_trait;
use oneadif_core::{Provider, UploadFile};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::multipart::Part;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::body::{self, ChunkedBody};
use crate::dialect::{Dialect, LoginEncoding, UploadEncoding};
use crate::error::TransferError;

/// Receives the fraction (0.0-1.0) of the upload body sent so far.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Sent with every provider request; several providers refuse unknown agents.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/74.0.3729.131 Safari/537.36";

/// One login plus one upload against a provider.
#[async_trait]
pub trait TransferClient: Send + Sync {
    type Session: Send + Sync;

    /// Authenticate with the stored credential payload.
    ///
    /// Rejected credentials are [`TransferError::Authentication`].
    async fn login(&self, credentials: &Value) -> Result<Self::Session, TransferError>;

    /// Send `file` and report whether the provider accepted it.
    ///
    /// An ordinary refusal is `Ok(false)`. Observing `cancel` while the
    /// body is streaming aborts the call with [`TransferError::Cancelled`].
    async fn upload(
        &self,
        session: &Self::Session,
        file: &UploadFile,
        params: &Value,
        progress: ProgressFn,
        cancel: &CancellationToken,
    ) -> Result<bool, TransferError>;
}

/// Authenticated provider session. Cookies live in `http`.
#[derive(Debug, Clone)]
pub struct ElogSession {
    http: reqwest::Client,
    token: Option<String>,
}

impl ElogSession {
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// [`TransferClient`] for the providers in [`Provider`].
#[derive(Debug, Clone)]
pub struct ElogClient {
    dialect: Dialect,
}

impl ElogClient {
    pub fn new(provider: Provider) -> Self {
        Self::with_dialect(Dialect::for_provider(provider))
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Collect the dialect's credential fields plus its constant fields.
    fn login_fields(&self, credentials: &Value) -> Result<Vec<(String, String)>, TransferError> {
        let mut fields = Vec::new();
        for name in self.dialect.credential_fields {
            let value = match credentials.get(name) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => {
                    return Err(TransferError::Authentication(format!(
                        "credential field '{name}' is missing"
                    )))
                }
            };
            fields.push((name.to_string(), value));
        }
        for (name, value) in self.dialect.login_extra {
            fields.push((name.to_string(), value.to_string()));
        }
        Ok(fields)
    }

    // ---- private helpers ----

    /// Map a non-2xx status to [`TransferError::HttpStatus`].
    fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, TransferError> {
        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::HttpStatus(status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl TransferClient for ElogClient {
    type Session = ElogSession;

    async fn login(&self, credentials: &Value) -> Result<ElogSession, TransferError> {
        let fields = self.login_fields(credentials)?;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()?;

        let request = http.post(self.dialect.login_url());
        let request = match self.dialect.login_encoding {
            LoginEncoding::Form => request.form(&fields),
            LoginEncoding::JsonToken => {
                let body: serde_json::Map<String, Value> = fields
                    .into_iter()
                    .map(|(name, value)| (name, Value::String(value)))
                    .collect();
                request.json(&body)
            }
        };

        let response = Self::ensure_success(request.send().await?)?;
        let text = response.text().await?;
        if text.contains(self.dialect.login_failure_marker) {
            return Err(TransferError::Authentication(format!(
                "{} rejected the credentials",
                self.dialect.provider
            )));
        }

        let token = match self.dialect.login_encoding {
            LoginEncoding::Form => None,
            LoginEncoding::JsonToken => {
                let value: Value = serde_json::from_str(&text).map_err(|e| {
                    TransferError::Fault(format!("login response is not JSON: {e}"))
                })?;
                match value.get("token").and_then(Value::as_str) {
                    Some(token) => Some(token.to_string()),
                    None => {
                        return Err(TransferError::Authentication(
                            "login response carries no token".into(),
                        ))
                    }
                }
            }
        };

        tracing::debug!(provider = %self.dialect.provider, "Provider login succeeded");
        Ok(ElogSession { http, token })
    }

    async fn upload(
        &self,
        session: &ElogSession,
        file: &UploadFile,
        params: &Value,
        progress: ProgressFn,
        cancel: &CancellationToken,
    ) -> Result<bool, TransferError> {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let request = session.http.post(self.dialect.upload_url());
        let request = match self.dialect.upload_encoding {
            UploadEncoding::Multipart { field } => {
                let content = file
                    .bytes()
                    .map_err(|e| TransferError::Fault(e.to_string()))?;
                let length = content.len() as u64;
                let stream = ChunkedBody::new(content, progress, cancel.clone());
                let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), length)
                    .file_name(file.name.clone())
                    .mime_str("application/octet-stream")?;
                request.multipart(body::text_fields(params).part(field, part))
            }
            UploadEncoding::Json => {
                let data = body::json_upload(session.token(), &file.name, &file.content, params)
                    .map_err(|e| TransferError::Fault(e.to_string()))?;
                let length = data.len();
                let stream = ChunkedBody::new(data, progress, cancel.clone());
                request
                    .header(CONTENT_TYPE, "application/json")
                    .header(CONTENT_LENGTH, length)
                    .body(reqwest::Body::wrap_stream(stream))
            }
        };

        let sent = request.send().await;

        let response = match sent {
            Ok(response) => response,
            Err(_) if cancel.is_cancelled() => return Err(TransferError::Cancelled),
            Err(e) => return Err(e.into()),
        };
        let response = Self::ensure_success(response)?;
        let text = response.text().await?;

        let accepted = !text.contains(self.dialect.upload_failure_marker);
        if !accepted {
            tracing::warn!(provider = %self.dialect.provider, "Provider refused the upload");
        }
        Ok(accepted)
    }
}
