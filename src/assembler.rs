//! Submission assembly: one JSON payload plus every captured file, keyed by role.
//!
//! ## File keys
//!
//! The persistence service matches files by key, so the names are fixed:
//!
//! | Slot | Key |
//! |------|-----|
//! | document | `file_<kind>_<owner\|third_party>_<index>`, e.g. `file_license_owner_0` |
//! | guided photo | `file_photo_vehicle_<photo id>_<index>`, e.g. `file_photo_vehicle_left_side_0` |
//!
//! A slot holds one file, so the index is always 0. Keys are collected in a
//! `BTreeMap`, which makes the key set and its order a function of the
//! populated slots alone.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::capture::{CapturedFile, DocumentCaptureService};
use crate::draft::{
    AssistanceKind, AttendanceKind, ClaimDraft, ClaimSubtype, TheftWithoutDocumentsRecord,
};
use crate::error::IntakeError;
use crate::slot::{DocumentSlot, ExtractedFields, ExtractionStatus, Party, SlotRole};

/// Submission file key for a slot.
pub fn file_key(role: SlotRole, index: usize) -> String {
    match role {
        SlotRole::Document { kind, party } => {
            format!("file_{}_{}_{index}", kind.key(), party.key())
        }
        SlotRole::Photo { photo } => format!("file_photo_vehicle_{}_{index}", photo.id()),
    }
}

/// What the payload says about one submitted file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotSummary {
    pub key: String,
    pub role: SlotRole,
    pub file_name: String,
    pub media_type: String,
    pub sha256: String,
    pub status: ExtractionStatus,
    /// Only for a successful extraction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<ExtractedFields>,
    /// The claimant continued past a failed extraction.
    pub failure_acknowledged: bool,
}

impl SlotSummary {
    fn new(key: String, slot: &DocumentSlot, file: &CapturedFile) -> Self {
        Self {
            key,
            role: slot.role(),
            file_name: file.file_name().to_string(),
            media_type: file.media_type().to_string(),
            sha256: file.digest().to_string(),
            status: slot.status(),
            fields: slot.extracted_fields().cloned(),
            failure_acknowledged: slot.failure_acknowledged(),
        }
    }
}

/// The structured part of a submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionPayload {
    pub attendance_kind: Option<AttendanceKind>,
    pub claim_subtype: Option<ClaimSubtype>,
    pub assistance_subtype: Option<AssistanceKind>,
    pub documents_stolen: Option<bool>,
    pub other_vehicles_involved: Option<bool>,
    pub additional_assistance_requested: Option<bool>,
    pub additional_assistance_kinds: Vec<AssistanceKind>,
    pub third_party_documented: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theft_without_documents: Option<TheftWithoutDocumentsRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    pub declaration_accepted: bool,
    pub files: Vec<SlotSummary>,
}

/// Everything the persistence collaborator receives.
#[derive(Debug, Clone)]
pub struct SubmissionPackage {
    pub payload: SubmissionPayload,
    pub files: BTreeMap<String, CapturedFile>,
}

impl SubmissionPackage {
    /// The text part of the multipart request.
    pub fn payload_json(&self) -> Result<String, IntakeError> {
        serde_json::to_string(&self.payload)
            .map_err(|e| IntakeError::Internal(format!("payload serialisation failed: {e}")))
    }

    pub fn file_keys(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }
}

/// Package the draft and every populated slot.
///
/// Each slot holding a file contributes exactly one entry; two slots
/// mapping to one key is an error rather than a silent overwrite.
pub fn assemble(
    draft: &ClaimDraft,
    slots: &DocumentCaptureService,
) -> Result<SubmissionPackage, IntakeError> {
    let mut files = BTreeMap::new();
    let mut summaries = Vec::new();

    for slot in slots.populated() {
        let Some(file) = slot.file() else { continue };
        let key = file_key(slot.role(), 0);
        if files.contains_key(&key) {
            return Err(IntakeError::DuplicateFileKey(key));
        }
        debug!("{} → {key} ({} bytes)", slot.role(), file.len());
        summaries.push(SlotSummary::new(key.clone(), slot, file));
        files.insert(key, file.clone());
    }

    let third_party_documented = summaries.iter().any(|s| {
        matches!(
            s.role,
            SlotRole::Document {
                party: Party::ThirdParty,
                ..
            }
        )
    });

    let payload = SubmissionPayload {
        attendance_kind: draft.attendance_kind(),
        claim_subtype: draft.claim_subtype(),
        assistance_subtype: draft.assistance_subtype(),
        documents_stolen: draft.documents_stolen(),
        other_vehicles_involved: draft.other_vehicles_involved(),
        additional_assistance_requested: draft.additional_assistance_requested(),
        additional_assistance_kinds: draft.additional_assistance_kinds().iter().copied().collect(),
        third_party_documented,
        theft_without_documents: draft.theft_without_documents().cloned(),
        external_reference: draft.external_reference().map(str::to_string),
        declaration_accepted: draft.declaration_accepted(),
        files: summaries,
    };

    info!("Assembled submission with {} file(s)", files.len());
    Ok(SubmissionPackage { payload, files })
}
