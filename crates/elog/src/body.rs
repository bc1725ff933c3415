//! Request bodies for uploads.
//!
//! Bodies are assembled in memory and then streamed through
//! [`ChunkedBody`], which checks the cancellation token before every chunk
//! and reports the fraction handed to the transport after every chunk.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use reqwest::multipart::Form;
use tokio_util::sync::CancellationToken;

use crate::client::ProgressFn;

/// Bytes handed to the transport per poll.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Form holding one text part per scalar entry in `params`.
///
/// The file part is appended by the caller, after these.
pub fn text_fields(params: &serde_json::Value) -> Form {
    let Some(params) = params.as_object() else {
        return Form::new();
    };
    params.iter().fold(Form::new(), |form, (name, value)| {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null
            | serde_json::Value::Array(_)
            | serde_json::Value::Object(_) => return form,
            other => other.to_string(),
        };
        form.text(name.clone(), text)
    })
}

/// Build the JSON upload body `{token, files: [{name, file}], ...params}`.
pub fn json_upload(
    token: Option<&str>,
    file_name: &str,
    file_content: &str,
    params: &serde_json::Value,
) -> Result<Vec<u8>, serde_json::Error> {
    let mut body = serde_json::Map::new();
    if let Some(params) = params.as_object() {
        body.extend(params.clone());
    }
    body.insert("token".into(), token.into());
    body.insert(
        "files".into(),
        serde_json::json!([{ "name": file_name, "file": file_content }]),
    );
    serde_json::to_vec(&body)
}

/// Stream over an in-memory body with cooperative cancellation.
pub struct ChunkedBody {
    data: Vec<u8>,
    offset: usize,
    chunk_size: usize,
    progress: ProgressFn,
    cancel: CancellationToken,
    done: bool,
}

impl ChunkedBody {
    pub fn new(data: Vec<u8>, progress: ProgressFn, cancel: CancellationToken) -> Self {
        Self::with_chunk_size(data, CHUNK_SIZE, progress, cancel)
    }

    pub fn with_chunk_size(
        data: Vec<u8>,
        chunk_size: usize,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            data,
            offset: 0,
            chunk_size: chunk_size.max(1),
            progress,
            cancel,
            done: false,
        }
    }
}

impl Stream for ChunkedBody {
    type Item = Result<Vec<u8>, io::Error>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        if this.cancel.is_cancelled() {
            this.done = true;
            return Poll::Ready(Some(Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "transfer cancelled",
            ))));
        }

        let total = this.data.len();
        if this.offset >= total {
            this.done = true;
            if total == 0 {
                (this.progress)(1.0);
            }
            return Poll::Ready(None);
        }

        let end = (this.offset + this.chunk_size).min(total);
        let chunk = this.data[this.offset..end].to_vec();
        this.offset = end;
        (this.progress)(end as f64 / total as f64);
        Poll::Ready(Some(Ok(chunk)))
    }
}
