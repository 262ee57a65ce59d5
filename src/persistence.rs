//! The persistence collaborator: hands the finished package to the claims service.
//!
//! The wire format is one multipart request: a text part named `payload`
//! with the JSON from [`SubmissionPackage::payload_json`], then one file part
//! per key of [`SubmissionPackage::files`]. A successful answer carries the
//! claim reference; anything else is reported as a structured error the
//! finalization step can show and let the claimant retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::assembler::SubmissionPackage;
use crate::config::IntakeConfig;
use crate::error::IntakeError;

const SERVICE: &str = "persistence service";

/// Name of the multipart text part holding the JSON payload.
pub const PAYLOAD_PART: &str = "payload";

/// What the claims service returns for an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    #[serde(alias = "claimReference", alias = "reference")]
    pub claim_reference: String,
}

#[async_trait]
pub trait PersistenceCollaborator: Send + Sync {
    async fn submit(&self, package: &SubmissionPackage) -> Result<SubmissionReceipt, IntakeError>;
}

/// [`PersistenceCollaborator`] posting a multipart form over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPersistence {
    client: reqwest::Client,
    url: String,
    timeout_secs: u64,
}

impl HttpPersistence {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self, IntakeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| IntakeError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout_secs,
        })
    }

    pub fn from_config(config: &IntakeConfig) -> Result<Self, IntakeError> {
        let url = config
            .persistence_url
            .as_deref()
            .ok_or_else(|| IntakeError::InvalidConfig("persistence_url is not set".to_string()))?;
        Self::new(url, config.persistence_timeout_secs)
    }

    fn form(package: &SubmissionPackage) -> Result<reqwest::multipart::Form, IntakeError> {
        let mut form = reqwest::multipart::Form::new().text(PAYLOAD_PART, package.payload_json()?);
        for (key, file) in &package.files {
            let part = reqwest::multipart::Part::bytes(file.bytes().to_vec())
                .file_name(file.file_name().to_string())
                .mime_str(file.media_type())
                .map_err(|e| IntakeError::Internal(format!("media type for {key}: {e}")))?;
            form = form.part(key.clone(), part);
        }
        Ok(form)
    }
}

#[async_trait]
impl PersistenceCollaborator for HttpPersistence {
    async fn submit(&self, package: &SubmissionPackage) -> Result<SubmissionReceipt, IntakeError> {
        info!("Submitting {} file(s) to {}", package.files.len(), self.url);
        let form = Self::form(package)?;

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IntakeError::Timeout {
                        service: SERVICE.to_string(),
                        secs: self.timeout_secs,
                    }
                } else {
                    IntakeError::Transport {
                        service: SERVICE.to_string(),
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| IntakeError::Transport {
            service: SERVICE.to_string(),
            detail: e.to_string(),
        })?;

        let receipt = parse_receipt(status, &body)?;
        info!("Submission accepted: {}", receipt.claim_reference);
        Ok(receipt)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "error", alias = "detail")]
    message: String,
}

/// Turn an HTTP status and body into a receipt or a structured error.
pub fn parse_receipt(status: u16, body: &str) -> Result<SubmissionReceipt, IntakeError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.message)
            .unwrap_or_else(|_| body.trim().chars().take(200).collect());
        warn!("Submission rejected with HTTP {status}: {message}");
        return Err(IntakeError::SubmissionRejected { status, message });
    }

    let receipt: SubmissionReceipt =
        serde_json::from_str(body).map_err(|e| IntakeError::MalformedResponse {
            detail: format!("submission receipt: {e}"),
        })?;
    if receipt.claim_reference.trim().is_empty() {
        return Err(IntakeError::MalformedResponse {
            detail: "submission receipt has an empty claim reference".to_string(),
        });
    }
    Ok(receipt)
}
