//! Document capture: classify incoming files and keep them in their slots.
//!
//! The presentation layer hands over whatever the claimant picked: a phone
//! photo, a scanned PDF, occasionally something else entirely. [`classify`]
//! decides whether the file is an image or a PDF from the declared media
//! type, the filename suffix and finally the magic bytes, in that order, so a
//! file with a missing or generic (`application/octet-stream`) type is still
//! recognised.
//!
//! [`DocumentCaptureService`] owns every [`DocumentSlot`] of a draft. It is
//! the only place where slots are mutated, so a slot never holds extracted
//! fields without the file they came from.

use crate::error::{IntakeError, MSG_NOT_READABLE_ROLE};
use crate::pipeline::extract::{CompletedExtraction, ExtractionJob};
use crate::slot::{DocumentSlot, ExtractionStatus, SlotRole};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Broad media class of a captured file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Pdf,
}

/// A file as handed over by the presentation layer, before classification.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub file_name: String,
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl RawFile {
    pub fn new(file_name: impl Into<String>, media_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.map(str::to_string),
            bytes,
        }
    }

    /// Read a local file; the media type is left to suffix and magic sniffing.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, IntakeError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| IntakeError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        debug!("Read local file {} ({} bytes)", path.display(), bytes.len());
        Ok(Self {
            file_name,
            media_type: None,
            bytes,
        })
    }
}

/// A classified file held by a slot. Cloning shares the underlying bytes.
#[derive(Debug, Clone)]
pub struct CapturedFile {
    file_name: String,
    media_type: String,
    kind: MediaKind,
    bytes: Arc<[u8]>,
    digest: String,
}

impl CapturedFile {
    /// Classify a raw file, rejecting anything that is not an image or a PDF.
    pub fn from_raw(raw: RawFile) -> Result<Self, IntakeError> {
        let (kind, media_type) = classify(&raw)?;
        let digest = hex::encode(Sha256::digest(&raw.bytes));
        Ok(Self {
            file_name: raw.file_name,
            media_type,
            kind,
            bytes: Arc::from(raw.bytes),
            digest,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Canonical media type (`application/pdf`, `image/jpeg`, …).
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn is_pdf(&self) -> bool {
        self.kind == MediaKind::Pdf
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hex SHA-256 of the content.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

// ── Classification ───────────────────────────────────────────────────────

const PDF: &str = "application/pdf";

/// Image types the OCR providers accept as attachments.
const IMAGE_TYPES: &[(&str, &[&str])] = &[
    ("image/jpeg", &["jpg", "jpeg"]),
    ("image/png", &["png"]),
    ("image/webp", &["webp"]),
    ("image/heic", &["heic"]),
    ("image/heif", &["heif"]),
];

/// Decide whether a file is an image or a PDF.
///
/// Returns the media kind plus the canonical media type. Declared type wins
/// when it is specific; generic or missing types fall back to the suffix,
/// then to magic bytes.
pub fn classify(raw: &RawFile) -> Result<(MediaKind, String), IntakeError> {
    let unsupported = || IntakeError::UnsupportedMedia {
        file_name: raw.file_name.clone(),
        media_type: raw
            .media_type
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
    };

    if raw.bytes.is_empty() {
        return Err(unsupported());
    }

    let declared = raw
        .media_type
        .as_deref()
        .map(|m| m.split(';').next().unwrap_or(m).trim().to_ascii_lowercase());

    if let Some(found) = declared.as_deref().and_then(from_media_type) {
        return Ok(found);
    }
    if let Some(found) = from_suffix(&raw.file_name) {
        return Ok(found);
    }
    if let Some(found) = from_magic(&raw.bytes) {
        return Ok(found);
    }

    Err(unsupported())
}

fn from_media_type(declared: &str) -> Option<(MediaKind, String)> {
    let canonical = if declared == "image/jpg" { "image/jpeg" } else { declared };
    if canonical == PDF {
        return Some((MediaKind::Pdf, PDF.to_string()));
    }
    IMAGE_TYPES
        .iter()
        .find(|(mime, _)| *mime == canonical)
        .map(|(mime, _)| (MediaKind::Image, mime.to_string()))
}

fn from_suffix(file_name: &str) -> Option<(MediaKind, String)> {
    let ext = Path::new(file_name)
        .extension()?
        .to_string_lossy()
        .to_ascii_lowercase();
    if ext == "pdf" {
        return Some((MediaKind::Pdf, PDF.to_string()));
    }
    IMAGE_TYPES
        .iter()
        .find(|(_, exts)| exts.contains(&ext.as_str()))
        .map(|(mime, _)| (MediaKind::Image, mime.to_string()))
}

fn from_magic(bytes: &[u8]) -> Option<(MediaKind, String)> {
    let image = |mime: &str| Some((MediaKind::Image, mime.to_string()));
    if bytes.starts_with(b"%PDF") {
        Some((MediaKind::Pdf, PDF.to_string()))
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        image("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        image("image/jpeg")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        image("image/webp")
    } else if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" && matches!(&bytes[8..12], b"heic" | b"heix" | b"mif1") {
        image("image/heic")
    } else {
        None
    }
}

// ── Service ──────────────────────────────────────────────────────────────

/// What happened to a finished extraction when it reached its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The slot still held the dispatched file; the result was written.
    Applied,
    /// The file changed (or was cleared) since dispatch; the result was dropped.
    Stale,
}

/// Owner of every document and photo slot in one draft.
#[derive(Debug, Default)]
pub struct DocumentCaptureService {
    slots: BTreeMap<SlotRole, DocumentSlot>,
}

impl DocumentCaptureService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a file into a slot, replacing whatever it held.
    ///
    /// OCR roles move to `processing`; others stay `pending`. An unsupported
    /// file leaves the slot untouched.
    pub fn ingest(&mut self, role: SlotRole, raw: RawFile) -> Result<&DocumentSlot, IntakeError> {
        let file = CapturedFile::from_raw(raw)?;
        info!(
            "Ingest {} into {role}: {:?}, {} bytes",
            file.file_name(),
            file.kind(),
            file.len()
        );
        let slot = self.slot_mut(role);
        if slot.is_busy() {
            debug!("{role}: replacing file while an extraction is in flight");
        }
        slot.replace_file(file);
        Ok(slot)
    }

    /// Remove the file and every trace of its extraction.
    pub fn clear(&mut self, role: SlotRole) -> &DocumentSlot {
        let slot = self.slot_mut(role);
        slot.reset();
        debug!("Cleared {role}");
        slot
    }

    pub fn slot(&self, role: SlotRole) -> Option<&DocumentSlot> {
        self.slots.get(&role)
    }

    /// Slots that currently hold a file, in role order.
    pub fn populated(&self) -> impl Iterator<Item = &DocumentSlot> {
        self.slots.values().filter(|s| s.has_file())
    }

    /// Accept a failed extraction and continue with manually typed data.
    pub fn acknowledge_failure(&mut self, role: SlotRole) -> bool {
        self.slots
            .get_mut(&role)
            .is_some_and(DocumentSlot::acknowledge_failure)
    }

    /// Snapshot the file and fingerprint for an extraction about to start.
    ///
    /// Returns `None` unless the slot is waiting for one.
    pub fn dispatch(&self, role: SlotRole) -> Option<ExtractionJob> {
        let slot = self.slots.get(&role)?;
        if slot.status() != ExtractionStatus::Processing {
            return None;
        }
        Some(ExtractionJob {
            role,
            file: slot.file()?.clone(),
            fingerprint: slot.fingerprint()?,
        })
    }

    /// Write a finished extraction into its slot, unless it went stale.
    pub fn apply(&mut self, completed: CompletedExtraction) -> ApplyOutcome {
        let role = completed.role;
        let Some(slot) = self.slots.get_mut(&role) else {
            warn!("{role}: extraction finished for a slot that no longer exists");
            return ApplyOutcome::Stale;
        };

        let current = slot.fingerprint();
        if current.as_ref() != Some(&completed.fingerprint) || !slot.is_busy() {
            warn!(
                "{role}: discarding stale extraction (dispatched generation {}, slot at {:?})",
                completed.fingerprint.generation,
                current.map(|f| f.generation)
            );
            return ApplyOutcome::Stale;
        }

        let result = completed.result;
        match (result.succeeded, result.fields) {
            (true, Some(fields)) => {
                info!("{role}: extraction succeeded after {} attempt(s)", result.attempts.len());
                slot.record_success(fields);
            }
            _ => {
                let message = result
                    .error
                    .unwrap_or_else(|| MSG_NOT_READABLE_ROLE.to_string());
                info!("{role}: extraction failed after {} attempt(s)", result.attempts.len());
                slot.record_failure(message);
            }
        }
        ApplyOutcome::Applied
    }

    fn slot_mut(&mut self, role: SlotRole) -> &mut DocumentSlot {
        self.slots
            .entry(role)
            .or_insert_with(|| DocumentSlot::new(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract::ExtractionResult;
    use crate::slot::{ExtractedFields, LicenseFields, Party, VehiclePhoto};

    fn pdf(name: &str) -> RawFile {
        RawFile::new(name, Some("application/pdf"), b"%PDF-1.7 test".to_vec())
    }

    fn jpeg(name: &str) -> RawFile {
        RawFile::new(name, None, vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3])
    }

    fn license_fields() -> ExtractedFields {
        ExtractedFields::License(LicenseFields {
            full_name: "Ana Souza".into(),
            national_id: "12345678900".into(),
            ..Default::default()
        })
    }

    fn completed(job: ExtractionJob, fields: Option<ExtractedFields>) -> CompletedExtraction {
        let result = match fields {
            Some(f) => ExtractionResult::success(job.role, f, Vec::new()),
            None => ExtractionResult::failure(job.role, Vec::new()),
        };
        CompletedExtraction {
            role: job.role,
            fingerprint: job.fingerprint,
            result,
        }
    }

    #[test]
    fn classify_by_declared_type_suffix_and_magic() {
        assert_eq!(classify(&pdf("scan")).unwrap().0, MediaKind::Pdf);
        assert_eq!(
            classify(&RawFile::new("IMG_001.JPG", Some("application/octet-stream"), vec![1, 2]))
                .unwrap(),
            (MediaKind::Image, "image/jpeg".to_string())
        );
        assert_eq!(
            classify(&RawFile::new("upload", None, b"%PDF-1.4".to_vec())).unwrap().0,
            MediaKind::Pdf
        );
        assert_eq!(
            classify(&RawFile::new("photo", Some("image/jpg"), vec![1])).unwrap().1,
            "image/jpeg"
        );
    }

    #[test]
    fn classify_rejects_unsupported_and_empty() {
        let txt = RawFile::new("notes.txt", Some("text/plain"), b"hello".to_vec());
        assert!(matches!(classify(&txt), Err(IntakeError::UnsupportedMedia { .. })));

        let empty = RawFile::new("scan.pdf", Some("application/pdf"), Vec::new());
        assert!(matches!(classify(&empty), Err(IntakeError::UnsupportedMedia { .. })));
    }

    #[test]
    fn ingest_sets_processing_only_for_ocr_roles() {
        let mut capture = DocumentCaptureService::new();
        let license = SlotRole::license(Party::Owner);
        assert_eq!(
            capture.ingest(license, pdf("cnh.pdf")).unwrap().status(),
            ExtractionStatus::Processing
        );

        let photo = SlotRole::photo(VehiclePhoto::Front);
        let slot = capture.ingest(photo, jpeg("front.jpg")).unwrap();
        assert_eq!(slot.status(), ExtractionStatus::Pending);
        assert!(slot.is_satisfied());
    }

    #[test]
    fn unsupported_file_leaves_slot_untouched() {
        let mut capture = DocumentCaptureService::new();
        let role = SlotRole::police_report();
        capture.ingest(role, pdf("bo.pdf")).unwrap();
        let before = capture.slot(role).unwrap().fingerprint();

        let err = capture.ingest(role, RawFile::new("x.zip", Some("application/zip"), vec![1]));
        assert!(err.is_err());
        assert_eq!(capture.slot(role).unwrap().fingerprint(), before);
    }

    #[test]
    fn clear_resets_fields_and_status() {
        let mut capture = DocumentCaptureService::new();
        let role = SlotRole::license(Party::Owner);
        capture.ingest(role, pdf("cnh.pdf")).unwrap();
        let job = capture.dispatch(role).unwrap();
        assert_eq!(capture.apply(completed(job, Some(license_fields()))), ApplyOutcome::Applied);
        assert_eq!(capture.slot(role).unwrap().status(), ExtractionStatus::Succeeded);

        for _ in 0..2 {
            let slot = capture.clear(role);
            assert!(!slot.has_file());
            assert!(slot.extracted_fields().is_none());
            assert_eq!(slot.status(), ExtractionStatus::Pending);
            assert!(slot.last_error().is_none());
        }
    }

    #[test]
    fn late_result_for_replaced_file_is_discarded() {
        let mut capture = DocumentCaptureService::new();
        let role = SlotRole::license(Party::Owner);
        capture.ingest(role, pdf("first.pdf")).unwrap();
        let stale_job = capture.dispatch(role).unwrap();

        // Same bytes, new upload: the generation still moves on.
        capture.ingest(role, pdf("first.pdf")).unwrap();
        let fresh_job = capture.dispatch(role).unwrap();
        assert_ne!(stale_job.fingerprint, fresh_job.fingerprint);

        assert_eq!(
            capture.apply(completed(stale_job, Some(license_fields()))),
            ApplyOutcome::Stale
        );
        assert_eq!(capture.slot(role).unwrap().status(), ExtractionStatus::Processing);

        assert_eq!(capture.apply(completed(fresh_job, None)), ApplyOutcome::Applied);
        let slot = capture.slot(role).unwrap();
        assert_eq!(slot.status(), ExtractionStatus::Failed);
        assert!(slot.last_error().is_some());
    }

    #[test]
    fn result_after_clear_is_discarded() {
        let mut capture = DocumentCaptureService::new();
        let role = SlotRole::registration(Party::ThirdParty);
        capture.ingest(role, pdf("crlv.pdf")).unwrap();
        let job = capture.dispatch(role).unwrap();
        capture.clear(role);
        assert_eq!(capture.apply(completed(job, None)), ApplyOutcome::Stale);
        assert_eq!(capture.slot(role).unwrap().status(), ExtractionStatus::Pending);
    }

    #[test]
    fn failure_acknowledgement_unblocks_slot() {
        let mut capture = DocumentCaptureService::new();
        let role = SlotRole::license(Party::Owner);
        assert!(!capture.acknowledge_failure(role));

        capture.ingest(role, jpeg("cnh.jpg")).unwrap();
        assert!(!capture.acknowledge_failure(role), "nothing failed yet");

        let job = capture.dispatch(role).unwrap();
        capture.apply(completed(job, None));
        assert!(!capture.slot(role).unwrap().is_satisfied());
        assert!(capture.acknowledge_failure(role));
        assert!(capture.slot(role).unwrap().is_satisfied());

        capture.ingest(role, jpeg("cnh2.jpg")).unwrap();
        assert!(!capture.slot(role).unwrap().failure_acknowledged());
    }

    #[test]
    fn digest_is_content_hash() {
        let a = CapturedFile::from_raw(pdf("a.pdf")).unwrap();
        let b = CapturedFile::from_raw(pdf("b.pdf")).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
    }
}
