//! Upload payloads handed from the control plane to a worker.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::provider::Provider;
use crate::types::JobId;

/// A log file to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    pub name: String,
    /// File text, or base64 behind a data-URL prefix (`data:...;base64,`)
    /// or a bare leading comma as produced by browser file readers.
    pub content: String,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Raw bytes of the file.
    pub fn bytes(&self) -> Result<Vec<u8>, CoreError> {
        let encoded = if let Some(rest) = self.content.strip_prefix("data:") {
            match rest.split_once(',') {
                Some((_, data)) => data,
                None => {
                    return Err(CoreError::InvalidPayload(format!(
                        "data URL for '{}' has no payload",
                        self.name
                    )))
                }
            }
        } else if let Some(data) = self.content.strip_prefix(',') {
            data
        } else {
            return Ok(self.content.as_bytes().to_vec());
        };

        STANDARD
            .decode(encoded.trim())
            .map_err(|e| CoreError::InvalidPayload(format!("'{}': {e}", self.name)))
    }
}

/// Everything a worker needs to run one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_id: JobId,
    pub provider: Provider,
    /// Provider credential payload (`login_data` of the account).
    pub credentials: serde_json::Value,
    pub file: UploadFile,
    /// Provider-specific upload parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn plain_text_is_used_verbatim() {
        let file = UploadFile::new("x.adi", "<CALL:5>RZ3DC<EOR>");
        assert_eq!(file.bytes().unwrap(), b"<CALL:5>RZ3DC<EOR>");
    }

    #[test]
    fn leading_comma_means_base64() {
        let file = UploadFile::new("x.adi", ",PENBTEw6NT5SWjNEQw==");
        assert_eq!(file.bytes().unwrap(), b"<CALL:5>RZ3DC");
    }

    #[test]
    fn data_url_is_decoded() {
        let file = UploadFile::new("x.adi", "data:application/octet-stream;base64,PEVPUj4=");
        assert_eq!(file.bytes().unwrap(), b"<EOR>");
    }

    #[test]
    fn broken_base64_is_rejected() {
        let file = UploadFile::new("x.adi", ",not base64!");
        assert_matches!(file.bytes(), Err(CoreError::InvalidPayload(_)));
    }

    #[test]
    fn data_url_without_payload_is_rejected() {
        let file = UploadFile::new("x.adi", "data:text/plain");
        assert_matches!(file.bytes(), Err(CoreError::InvalidPayload(_)));
    }

    #[test]
    fn spec_params_default_to_null() {
        let spec: JobSpec = serde_json::from_value(serde_json::json!({
            "job_id": "j1",
            "provider": "eQSL",
            "credentials": {"Callsign": "R7CL", "EnteredPassword": "x"},
            "file": {"name": "x.adi", "content": "..."}
        }))
        .unwrap();
        assert_eq!(spec.provider, Provider::Eqsl);
        assert!(spec.params.is_null());
    }
}
