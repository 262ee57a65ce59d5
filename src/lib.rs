//! # claim-intake
//!
//! The core of a guided insurance-claim and roadside-assistance intake: a step
//! navigator, OCR extraction of identity and vehicle documents, and the
//! assembly of everything collected into one submission.
//!
//! ## Overview
//!
//! ```text
//! claimant action
//!  │
//!  ├─ answer    ClaimDraft setters (dependent answers reset)
//!  ├─ upload    DocumentCaptureService  classify image/PDF, fill the slot
//!  │             └─ ExtractionPipeline   crop plan → render → OCR → validate, ≤ 3 tries
//!  ├─ continue  navigator               gate check, then the pure transition function
//!  └─ finish    assembler + persistence  JSON payload and keyed files, one multipart request
//! ```
//!
//! The navigator never mutates anything. It reads the [`ClaimDraft`] and the
//! slots and returns the next [`StepState`]; [`IntakeSession`] applies it.
//! Extraction results carry the fingerprint of the file they were dispatched
//! for, and a result for a replaced file is dropped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use claim_intake::{ExtractionPipeline, IntakeConfig, IntakeSession, RawFile, HttpPersistence};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = IntakeConfig::builder()
//!         .persistence_url("https://claims.example.com/api/submissions")
//!         .build()?;
//!     let persistence = HttpPersistence::from_config(&config)?;
//!     let mut session = IntakeSession::new(Arc::new(ExtractionPipeline::from_config(config)?));
//!
//!     // ... answer questions, advance ...
//!     let raw = RawFile::from_path("license.jpg").await?;
//!     if let Some(job) = session.upload_current(raw)? {
//!         let done = session.run(job).await;
//!         session.complete_extraction(done);
//!     }
//!     // ... advance to the last step ...
//!     let receipt = session.submit(&persistence).await?;
//!     println!("claim {}", receipt.claim_reference);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `claim-ocr` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! claim-intake = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assembler;
pub mod capture;
pub mod config;
pub mod draft;
pub mod error;
pub mod navigator;
pub mod persistence;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod slot;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assembler::{assemble, file_key, SubmissionPackage, SubmissionPayload};
pub use capture::{classify, ApplyOutcome, CapturedFile, DocumentCaptureService, MediaKind, RawFile};
pub use config::{IntakeConfig, IntakeConfigBuilder};
pub use draft::{
    AssistanceKind, AttendanceKind, ClaimDraft, ClaimSubtype, ManagerSeed, TheftWithoutDocumentsRecord,
};
pub use error::{AttemptError, IntakeError};
pub use navigator::{
    advance, can_advance, check_gate, slot_reachable, Gate, GateBlock, NavigationError, StepId, StepState,
};
pub use persistence::{HttpPersistence, PersistenceCollaborator, SubmissionReceipt};
pub use pipeline::crop::{CropPlan, CropStrategy, CropWindow};
pub use pipeline::extract::{AttemptRecord, CompletedExtraction, ExtractionJob, ExtractionPipeline, ExtractionResult};
pub use pipeline::ocr::{OcrCollaborator, OcrRequest, OcrResponse, VisionOcr};
pub use pipeline::render::{PageRenderer, PdfiumRenderer};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{AdvanceOutcome, IntakeSession};
pub use slot::{
    DocumentKind, DocumentSlot, ExtractedFields, ExtractionStatus, Fingerprint, LicenseFields, Party,
    PoliceReportFields, RegistrationFields, SlotRole, VehiclePhoto,
};
