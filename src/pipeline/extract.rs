//! The extraction pipeline: bounded, crop-aware retries around the OCR call.
//!
//! ## Retry Strategy
//!
//! A license or registration uploaded as a PDF gets up to
//! `max_pdf_attempts` tries (default 3): each configured crop strategy for
//! the document kind, then the uncropped page. Photos, and PDFs of other
//! documents, get exactly one try.
//!
//! Every attempt renders (if needed), calls the collaborator and validates
//! the mandatory fields. A render error, a transport error, a `success=false`
//! answer and a missing mandatory field all consume the attempt the same way.
//! The loop stops at the first attempt that validates. There is no backoff:
//! the next attempt uses a different crop, not the same request again.
//!
//! ## Stale results
//!
//! [`ExtractionJob`] carries the slot [`Fingerprint`] captured at dispatch.
//! [`crate::capture::DocumentCaptureService::apply`] compares it with the
//! slot's current one and drops the result if the file has changed since.

use crate::capture::{CapturedFile, MediaKind};
use crate::config::IntakeConfig;
use crate::error::{
    AttemptError, IntakeError, MSG_NOT_READABLE_ROLE, MSG_SERVICE_UNAVAILABLE, MSG_UNREADABLE,
};
use crate::pipeline::crop::{plan_attempts, AttemptPlan, CropWindow, RenderMode};
use crate::pipeline::encode;
use crate::pipeline::ocr::{OcrCollaborator, OcrRequest, VisionOcr};
use crate::pipeline::render::{render_page, PageRenderer, PdfiumRenderer};
use crate::progress::{ExtractionProgressCallback, NoopProgressCallback};
use crate::slot::{DocumentKind, ExtractedFields, Fingerprint, Party, SlotRole};
use edgequake_llm::ImageData;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Crop strategy name.
    pub strategy: String,
    pub duration_ms: u64,
    /// `None` when this attempt produced the accepted fields.
    pub error: Option<AttemptError>,
}

/// Result of a full extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub role: SlotRole,
    /// Present only when `succeeded`.
    pub fields: Option<ExtractedFields>,
    pub succeeded: bool,
    /// User-facing message when not `succeeded`.
    pub error: Option<String>,
    pub attempts: Vec<AttemptRecord>,
}

impl ExtractionResult {
    pub fn success(role: SlotRole, fields: ExtractedFields, attempts: Vec<AttemptRecord>) -> Self {
        Self {
            role,
            fields: Some(fields),
            succeeded: true,
            error: None,
            attempts,
        }
    }

    /// A failed run. The message depends on what sank the last attempt:
    /// an unreachable service reads differently from an unreadable document.
    pub fn failure(role: SlotRole, attempts: Vec<AttemptRecord>) -> Self {
        let message = match attempts.last().and_then(|a| a.error.as_ref()) {
            Some(AttemptError::Transport { .. }) => MSG_SERVICE_UNAVAILABLE,
            _ => MSG_UNREADABLE,
        };
        Self {
            role,
            fields: None,
            succeeded: false,
            error: Some(message.to_string()),
            attempts,
        }
    }

    fn not_readable(role: SlotRole) -> Self {
        Self {
            role,
            fields: None,
            succeeded: false,
            error: Some(MSG_NOT_READABLE_ROLE.to_string()),
            attempts: Vec::new(),
        }
    }

    /// Convert into a `Result`, for callers that treat failure as an error.
    ///
    /// A run where every attempt failed in transport is a
    /// [`IntakeError::Transport`]; anything else is
    /// [`IntakeError::ExtractionFailed`].
    pub fn into_result(self) -> Result<ExtractedFields, IntakeError> {
        if let (true, Some(fields)) = (self.succeeded, self.fields) {
            return Ok(fields);
        }
        let all_transport = !self.attempts.is_empty()
            && self
                .attempts
                .iter()
                .all(|a| matches!(a.error, Some(AttemptError::Transport { .. })));
        if all_transport {
            let detail = self
                .attempts
                .last()
                .and_then(|a| a.error.as_ref())
                .map(|e| e.to_string())
                .unwrap_or_default();
            return Err(IntakeError::Transport {
                service: "OCR service".to_string(),
                detail,
            });
        }
        let reason = self
            .attempts
            .last()
            .and_then(|a| a.error.as_ref())
            .map_or("role is not read automatically", AttemptError::reason)
            .to_string();
        Err(IntakeError::ExtractionFailed {
            role: self.role.to_string(),
            attempts: self.attempts.len() as u32,
            reason,
        })
    }
}

/// A dispatched extraction: the file plus the slot fingerprint at dispatch.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub role: SlotRole,
    pub file: CapturedFile,
    pub fingerprint: Fingerprint,
}

/// A finished extraction, ready to be applied to its slot.
#[derive(Debug, Clone)]
pub struct CompletedExtraction {
    pub role: SlotRole,
    pub fingerprint: Fingerprint,
    pub result: ExtractionResult,
}

/// Render → OCR → validate, with crop-strategy retries.
pub struct ExtractionPipeline {
    ocr: Arc<dyn OcrCollaborator>,
    renderer: Arc<dyn PageRenderer>,
    config: IntakeConfig,
}

impl ExtractionPipeline {
    pub fn new(ocr: Arc<dyn OcrCollaborator>, renderer: Arc<dyn PageRenderer>, config: IntakeConfig) -> Self {
        Self { ocr, renderer, config }
    }

    /// Pipeline with the vision-model OCR and the pdfium renderer.
    pub fn from_config(config: IntakeConfig) -> Result<Self, IntakeError> {
        let ocr = VisionOcr::from_config(&config)?;
        let renderer = PdfiumRenderer::new(config.max_rendered_pixels)
            .with_password(config.password.clone())
            .with_library_path(config.pdfium_library_path.clone());
        Ok(Self::new(Arc::new(ocr), Arc::new(renderer), config))
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    /// Attempts this pipeline would make for `file` in `role`.
    pub fn plan(&self, file: &CapturedFile, role: SlotRole) -> Vec<AttemptPlan> {
        plan_attempts(file.kind(), role, &self.config.crop_plan, self.config.max_pdf_attempts)
    }

    /// Run a dispatched job and tag the result with its fingerprint.
    pub async fn run(&self, job: ExtractionJob) -> CompletedExtraction {
        let result = self.extract(&job.file, job.role).await;
        CompletedExtraction {
            role: job.role,
            fingerprint: job.fingerprint,
            result,
        }
    }

    /// Extract the fields of `file` for `role`.
    ///
    /// Never returns `Err`: failures are described in the result so the
    /// caller can show the message on the slot. Use
    /// [`ExtractionResult::into_result`] for `?`-style handling.
    pub async fn extract(&self, file: &CapturedFile, role: SlotRole) -> ExtractionResult {
        let SlotRole::Document { kind, party } = role else {
            debug!("{role}: photos are not read automatically");
            return ExtractionResult::not_readable(role);
        };

        let noop = NoopProgressCallback;
        let cb: &dyn ExtractionProgressCallback = match &self.config.progress_callback {
            Some(cb) => cb.as_ref(),
            None => &noop,
        };

        let plans = self.plan(file, role);
        let total = plans.len() as u32;
        info!(
            "{role}: extracting from {} ({:?}), {} attempt(s) planned",
            file.file_name(),
            file.kind(),
            total
        );
        cb.on_extraction_start(role, total);

        let mut records = Vec::with_capacity(plans.len());
        for (idx, plan) in plans.iter().enumerate() {
            let attempt = idx as u32 + 1;
            cb.on_attempt_start(role, attempt, total, &plan.strategy);
            let start = Instant::now();

            let outcome = self.attempt(file, kind, party, plan, attempt).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match outcome {
                Ok(fields) => {
                    info!(
                        "{role}: attempt {attempt}/{total} ({}) succeeded in {duration_ms}ms",
                        plan.strategy
                    );
                    records.push(AttemptRecord {
                        attempt,
                        strategy: plan.strategy.clone(),
                        duration_ms,
                        error: None,
                    });
                    cb.on_extraction_complete(role, true, attempt);
                    return ExtractionResult::success(role, fields, records);
                }
                Err(e) => {
                    warn!("{role}: attempt {attempt}/{total} ({}) failed: {e}", plan.strategy);
                    cb.on_attempt_failed(role, attempt, &e.to_string());
                    records.push(AttemptRecord {
                        attempt,
                        strategy: plan.strategy.clone(),
                        duration_ms,
                        error: Some(e),
                    });
                }
            }
        }

        warn!("{role}: all {total} attempt(s) exhausted");
        cb.on_extraction_complete(role, false, total);
        ExtractionResult::failure(role, records)
    }

    async fn attempt(
        &self,
        file: &CapturedFile,
        kind: DocumentKind,
        party: Party,
        plan: &AttemptPlan,
        attempt: u32,
    ) -> Result<ExtractedFields, AttemptError> {
        let image = match (&plan.render, file.kind()) {
            (RenderMode::Passthrough, _) | (_, MediaKind::Image) => {
                encode::encode_original(file.bytes(), file.media_type())
            }
            (RenderMode::FullPage, MediaKind::Pdf) => self.render_and_encode(file, None, attempt).await?,
            (RenderMode::Cropped(window), MediaKind::Pdf) => {
                self.render_and_encode(file, Some(*window), attempt).await?
            }
        };

        let response = self
            .ocr
            .read(OcrRequest { kind, party, image })
            .await
            .map_err(|e| match e {
                e if e.is_transport() => AttemptError::Transport {
                    attempt,
                    detail: e.to_string(),
                },
                e => AttemptError::Rejected {
                    attempt,
                    message: e.to_string(),
                },
            })?;

        if !response.success {
            return Err(AttemptError::Rejected {
                attempt,
                message: response
                    .message
                    .unwrap_or_else(|| "document not recognised".to_string()),
            });
        }

        let fields = ExtractedFields::from_raw(kind, &response.fields);
        let missing = fields.missing_mandatory();
        if !missing.is_empty() {
            return Err(AttemptError::MissingFields {
                attempt,
                missing: missing.into_iter().map(str::to_string).collect(),
            });
        }
        Ok(fields)
    }

    async fn render_and_encode(
        &self,
        file: &CapturedFile,
        window: Option<CropWindow>,
        attempt: u32,
    ) -> Result<ImageData, AttemptError> {
        let render_err = |detail: String| AttemptError::Render { attempt, detail };
        let image = render_page(Arc::clone(&self.renderer), file.shared_bytes(), window)
            .await
            .map_err(|e| render_err(e.to_string()))?;
        encode::encode_page(&image).map_err(|e| render_err(format!("image encoding failed: {e}")))
    }
}
