//! Error types for the claim-intake library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IntakeError`] — the operation could not complete (unsupported file,
//!   extraction budget exhausted, collaborator unreachable, submission
//!   refused). Returned as `Err(IntakeError)`. Every variant is scoped to one
//!   slot or one step; none of them ends the session.
//!
//! * [`AttemptError`] — a single extraction attempt failed (render glitch,
//!   transport error, missing mandatory fields) but the retry loop may still
//!   succeed on a later crop strategy. Stored inside
//!   [`crate::pipeline::extract::AttemptRecord`] so callers can see why each
//!   attempt was rejected.
//!
//! A blocked step transition is not an error at all: the navigator returns a
//! [`crate::navigator::GateBlock`] value from its gate check.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the claim-intake library.
#[derive(Debug, Error)]
pub enum IntakeError {
    // ── Capture errors ────────────────────────────────────────────────────
    /// The file is neither an image nor a PDF.
    #[error("Unsupported file '{file_name}' ({media_type}). Please choose a photo or a PDF.")]
    UnsupportedMedia {
        file_name: String,
        media_type: String,
    },

    /// A local file could not be read.
    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Every attempt was consumed without a valid extraction.
    #[error("Extraction failed for {role} after {attempts} attempt(s): {reason}")]
    ExtractionFailed {
        role: String,
        attempts: u32,
        reason: String,
    },

    /// The PDF page could not be rasterised.
    #[error("Rendering failed: {detail}")]
    RenderFailed { detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set `pdfium_library_path` in the configuration or install libpdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// The OCR provider is not initialised (missing API key etc.).
    #[error("OCR provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The OCR collaborator answered with something that is not a field record.
    #[error("Malformed OCR response: {detail}")]
    MalformedResponse { detail: String },

    // ── Collaborator errors ───────────────────────────────────────────────
    /// A collaborator could not be reached or failed mid-request.
    #[error("{service} unreachable: {detail}")]
    Transport { service: String, detail: String },

    /// A collaborator call exceeded its timeout.
    #[error("{service} call timed out after {secs}s")]
    Timeout { service: String, secs: u64 },

    /// The persistence service refused the submission.
    #[error("Submission rejected (HTTP {status}): {message}")]
    SubmissionRejected { status: u16, message: String },

    // ── Session errors ────────────────────────────────────────────────────
    /// The current step has no document or photo slot to upload into.
    #[error("Step {step} does not take a file")]
    NoSlotAtStep { step: String },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// The session is not at a step where it may be submitted.
    #[error("Cannot assemble a submission from step {step}")]
    NotTerminal { step: String },

    /// The terminal step has been reached but its gate is still closed.
    #[error("Step {step} is incomplete: {reason}")]
    StepIncomplete { step: String, reason: String },

    /// Two populated slots mapped to the same file key.
    #[error("Duplicate submission file key '{0}'")]
    DuplicateFileKey(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntakeError {
    /// Whether the failure came from an unreachable or slow collaborator.
    pub fn is_transport(&self) -> bool {
        matches!(self, IntakeError::Transport { .. } | IntakeError::Timeout { .. })
    }
}

/// A non-fatal error for a single extraction attempt.
///
/// Every variant consumes one unit of the retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum AttemptError {
    /// The PDF page could not be rendered with this strategy.
    #[error("attempt {attempt}: render failed: {detail}")]
    Render { attempt: u32, detail: String },

    /// The OCR collaborator call itself failed.
    #[error("attempt {attempt}: OCR call failed: {detail}")]
    Transport { attempt: u32, detail: String },

    /// The collaborator answered `success = false`.
    #[error("attempt {attempt}: document not recognised: {message}")]
    Rejected { attempt: u32, message: String },

    /// The collaborator answered but mandatory fields were empty.
    #[error("attempt {attempt}: mandatory fields missing: {}", missing.join(", "))]
    MissingFields { attempt: u32, missing: Vec<String> },
}

impl AttemptError {
    /// 1-based attempt number this error belongs to.
    pub fn attempt(&self) -> u32 {
        match self {
            AttemptError::Render { attempt, .. }
            | AttemptError::Transport { attempt, .. }
            | AttemptError::Rejected { attempt, .. }
            | AttemptError::MissingFields { attempt, .. } => *attempt,
        }
    }

    /// Short failure class, without the attempt-specific detail.
    pub fn reason(&self) -> &'static str {
        match self {
            AttemptError::Render { .. } => "page could not be rendered",
            AttemptError::Transport { .. } => "OCR service unreachable",
            AttemptError::Rejected { .. } => "document not recognised",
            AttemptError::MissingFields { .. } => "mandatory fields missing",
        }
    }
}

/// Message shown on a slot when every attempt was rejected by validation.
pub const MSG_UNREADABLE: &str =
    "We could not read the required information from this document. \
Upload a sharper photo or a different file, or continue and type the details yourself.";

/// Message shown on a slot when the OCR service could not be reached.
pub const MSG_SERVICE_UNAVAILABLE: &str =
    "The document reader is unavailable right now. Please try uploading again in a moment.";

/// Message shown when a role cannot be read automatically at all.
pub const MSG_NOT_READABLE_ROLE: &str = "This file is stored as-is and is not read automatically.";
