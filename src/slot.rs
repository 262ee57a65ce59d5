//! Document slots: one holder per document or photo role in a draft.
//!
//! A slot owns at most one [`CapturedFile`] and, for roles that are read by
//! OCR, the fields extracted from it. Mutation goes through
//! [`crate::capture::DocumentCaptureService`], which keeps the invariant that
//! extracted fields are only visible while the slot's status is
//! [`ExtractionStatus::Succeeded`] for the file currently held.

use crate::capture::CapturedFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ── Roles ────────────────────────────────────────────────────────────────

/// Whose document or vehicle a slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Owner,
    ThirdParty,
}

impl Party {
    /// Segment used in submission file keys.
    pub fn key(self) -> &'static str {
        match self {
            Party::Owner => "owner",
            Party::ThirdParty => "third_party",
        }
    }
}

/// Kind of identity or vehicle document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Driver's license (name, national id, birth date).
    License,
    /// Vehicle registration certificate (plate, registry number).
    Registration,
    /// Police incident report.
    PoliceReport,
}

impl DocumentKind {
    /// Segment used in submission file keys.
    pub fn key(self) -> &'static str {
        match self {
            DocumentKind::License => "license",
            DocumentKind::Registration => "registration",
            DocumentKind::PoliceReport => "police_report",
        }
    }

    /// Whether documents of this kind go through the crop-retry OCR loop.
    pub fn is_ocr_eligible(self) -> bool {
        matches!(self, DocumentKind::License | DocumentKind::Registration)
    }

    /// Raw field names that must be non-empty for an extraction to count.
    pub fn mandatory_fields(self) -> &'static [&'static str] {
        match self {
            DocumentKind::License => &[FIELD_FULL_NAME, FIELD_NATIONAL_ID],
            DocumentKind::Registration => &[FIELD_PLATE, FIELD_REGISTRY_NUMBER],
            DocumentKind::PoliceReport => &[],
        }
    }
}

/// One photograph in a guided vehicle-photo sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehiclePhoto {
    Front,
    Rear,
    LeftSide,
    RightSide,
    Damage,
    Chassis,
    ThirdPartyFront,
    ThirdPartyRear,
    ThirdPartyDamage,
}

impl VehiclePhoto {
    /// Stable step id used in submission file keys.
    pub fn id(self) -> &'static str {
        match self {
            VehiclePhoto::Front => "front",
            VehiclePhoto::Rear => "rear",
            VehiclePhoto::LeftSide => "left_side",
            VehiclePhoto::RightSide => "right_side",
            VehiclePhoto::Damage => "damage",
            VehiclePhoto::Chassis => "chassis",
            VehiclePhoto::ThirdPartyFront => "third_party_front",
            VehiclePhoto::ThirdPartyRear => "third_party_rear",
            VehiclePhoto::ThirdPartyDamage => "third_party_damage",
        }
    }

    pub fn is_third_party(self) -> bool {
        matches!(
            self,
            VehiclePhoto::ThirdPartyFront | VehiclePhoto::ThirdPartyRear | VehiclePhoto::ThirdPartyDamage
        )
    }

    /// Short instruction shown to the claimant.
    pub fn label(self) -> &'static str {
        match self {
            VehiclePhoto::Front => "Front of the vehicle, plate visible",
            VehiclePhoto::Rear => "Rear of the vehicle, plate visible",
            VehiclePhoto::LeftSide => "Left side of the vehicle",
            VehiclePhoto::RightSide => "Right side of the vehicle",
            VehiclePhoto::Damage => "Close-up of the damaged area",
            VehiclePhoto::Chassis => "Chassis number engraving",
            VehiclePhoto::ThirdPartyFront => "Front of the other vehicle, plate visible",
            VehiclePhoto::ThirdPartyRear => "Rear of the other vehicle, plate visible",
            VehiclePhoto::ThirdPartyDamage => "Damage on the other vehicle",
        }
    }
}

/// The semantic role of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlotRole {
    Document { kind: DocumentKind, party: Party },
    Photo { photo: VehiclePhoto },
}

impl SlotRole {
    pub fn license(party: Party) -> Self {
        SlotRole::Document {
            kind: DocumentKind::License,
            party,
        }
    }

    pub fn registration(party: Party) -> Self {
        SlotRole::Document {
            kind: DocumentKind::Registration,
            party,
        }
    }

    /// The single police-report slot, filed under the owner.
    pub fn police_report() -> Self {
        SlotRole::Document {
            kind: DocumentKind::PoliceReport,
            party: Party::Owner,
        }
    }

    pub fn photo(photo: VehiclePhoto) -> Self {
        SlotRole::Photo { photo }
    }

    pub fn document_kind(self) -> Option<DocumentKind> {
        match self {
            SlotRole::Document { kind, .. } => Some(kind),
            SlotRole::Photo { .. } => None,
        }
    }

    /// Whose vehicle or papers the slot documents.
    pub fn party(self) -> Party {
        match self {
            SlotRole::Document { party, .. } => party,
            SlotRole::Photo { photo } if photo.is_third_party() => Party::ThirdParty,
            SlotRole::Photo { .. } => Party::Owner,
        }
    }

    /// Whether ingesting a file into this slot starts an extraction.
    pub fn requires_ocr(self) -> bool {
        self.document_kind().is_some_and(DocumentKind::is_ocr_eligible)
    }
}

impl fmt::Display for SlotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotRole::Document { kind, party } => write!(f, "{} ({})", kind.key(), party.key()),
            SlotRole::Photo { photo } => write!(f, "photo {}", photo.id()),
        }
    }
}

// ── Extracted fields ─────────────────────────────────────────────────────

pub const FIELD_FULL_NAME: &str = "full_name";
pub const FIELD_NATIONAL_ID: &str = "national_id";
pub const FIELD_BIRTH_DATE: &str = "birth_date";
pub const FIELD_LICENSE_NUMBER: &str = "license_number";
pub const FIELD_EXPIRY_DATE: &str = "expiry_date";
pub const FIELD_CATEGORY: &str = "category";
pub const FIELD_PLATE: &str = "plate";
pub const FIELD_REGISTRY_NUMBER: &str = "registry_number";
pub const FIELD_CHASSIS: &str = "chassis";
pub const FIELD_MAKE_MODEL: &str = "make_model";
pub const FIELD_MODEL_YEAR: &str = "model_year";
pub const FIELD_OWNER_NAME: &str = "owner_name";
pub const FIELD_REPORT_NUMBER: &str = "report_number";
pub const FIELD_ISSUED_ON: &str = "issued_on";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseFields {
    pub full_name: String,
    pub national_id: String,
    pub birth_date: Option<String>,
    pub license_number: Option<String>,
    pub expiry_date: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationFields {
    pub plate: String,
    pub registry_number: String,
    pub chassis: Option<String>,
    pub make_model: Option<String>,
    pub model_year: Option<String>,
    pub owner_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoliceReportFields {
    pub report_number: Option<String>,
    pub issued_on: Option<String>,
}

/// Role-specific record extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractedFields {
    License(LicenseFields),
    Registration(RegistrationFields),
    PoliceReport(PoliceReportFields),
}

impl ExtractedFields {
    /// Build the typed record from the collaborator's raw field map.
    ///
    /// Values are trimmed; empty values become `None` (or an empty string
    /// for mandatory fields, which then fail [`Self::missing_mandatory`]).
    pub fn from_raw(kind: DocumentKind, raw: &BTreeMap<String, String>) -> Self {
        let opt = |key: &str| {
            raw.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let req = |key: &str| opt(key).unwrap_or_default();

        match kind {
            DocumentKind::License => ExtractedFields::License(LicenseFields {
                full_name: req(FIELD_FULL_NAME),
                national_id: req(FIELD_NATIONAL_ID),
                birth_date: opt(FIELD_BIRTH_DATE),
                license_number: opt(FIELD_LICENSE_NUMBER),
                expiry_date: opt(FIELD_EXPIRY_DATE),
                category: opt(FIELD_CATEGORY),
            }),
            DocumentKind::Registration => ExtractedFields::Registration(RegistrationFields {
                plate: req(FIELD_PLATE),
                registry_number: req(FIELD_REGISTRY_NUMBER),
                chassis: opt(FIELD_CHASSIS),
                make_model: opt(FIELD_MAKE_MODEL),
                model_year: opt(FIELD_MODEL_YEAR),
                owner_name: opt(FIELD_OWNER_NAME),
            }),
            DocumentKind::PoliceReport => ExtractedFields::PoliceReport(PoliceReportFields {
                report_number: opt(FIELD_REPORT_NUMBER),
                issued_on: opt(FIELD_ISSUED_ON),
            }),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            ExtractedFields::License(_) => DocumentKind::License,
            ExtractedFields::Registration(_) => DocumentKind::Registration,
            ExtractedFields::PoliceReport(_) => DocumentKind::PoliceReport,
        }
    }

    /// Names of mandatory fields that are empty after trimming.
    pub fn missing_mandatory(&self) -> Vec<&'static str> {
        let blank = |s: &str| s.trim().is_empty();
        let mut missing = Vec::new();
        match self {
            ExtractedFields::License(l) => {
                if blank(&l.full_name) {
                    missing.push(FIELD_FULL_NAME);
                }
                if blank(&l.national_id) {
                    missing.push(FIELD_NATIONAL_ID);
                }
            }
            ExtractedFields::Registration(r) => {
                if blank(&r.plate) {
                    missing.push(FIELD_PLATE);
                }
                if blank(&r.registry_number) {
                    missing.push(FIELD_REGISTRY_NUMBER);
                }
            }
            ExtractedFields::PoliceReport(_) => {}
        }
        missing
    }

    pub fn is_valid(&self) -> bool {
        self.missing_mandatory().is_empty()
    }
}

// ── Slot ─────────────────────────────────────────────────────────────────

/// Extraction lifecycle of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    #[default]
    Pending,
    Processing,
    Succeeded,
    Failed,
}

/// Identity of the file a slot held when an extraction was dispatched.
///
/// `generation` increments on every ingest and clear, so re-uploading a
/// byte-identical file still invalidates results dispatched earlier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub digest: String,
    pub generation: u64,
}

/// A named holder for exactly one document or photo.
#[derive(Debug, Clone)]
pub struct DocumentSlot {
    role: SlotRole,
    file: Option<CapturedFile>,
    extracted: Option<ExtractedFields>,
    status: ExtractionStatus,
    last_error: Option<String>,
    failure_acknowledged: bool,
    generation: u64,
}

impl DocumentSlot {
    pub fn new(role: SlotRole) -> Self {
        Self {
            role,
            file: None,
            extracted: None,
            status: ExtractionStatus::Pending,
            last_error: None,
            failure_acknowledged: false,
            generation: 0,
        }
    }

    pub fn role(&self) -> SlotRole {
        self.role
    }

    pub fn file(&self) -> Option<&CapturedFile> {
        self.file.as_ref()
    }

    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    pub fn status(&self) -> ExtractionStatus {
        self.status
    }

    /// Extracted fields, only while the extraction for the held file succeeded.
    pub fn extracted_fields(&self) -> Option<&ExtractedFields> {
        match self.status {
            ExtractionStatus::Succeeded => self.extracted.as_ref(),
            _ => None,
        }
    }

    /// User-facing message from the last failed extraction.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn failure_acknowledged(&self) -> bool {
        self.failure_acknowledged
    }

    pub fn is_busy(&self) -> bool {
        self.status == ExtractionStatus::Processing
    }

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.file.as_ref().map(|f| Fingerprint {
            digest: f.digest().to_string(),
            generation: self.generation,
        })
    }

    /// Whether the slot lets its capture step proceed.
    ///
    /// OCR roles need a successful extraction, or a failed one the claimant
    /// explicitly chose to continue past. Other roles only need a file.
    pub fn is_satisfied(&self) -> bool {
        if !self.has_file() {
            return false;
        }
        if !self.role.requires_ocr() {
            return true;
        }
        match self.status {
            ExtractionStatus::Succeeded => true,
            ExtractionStatus::Failed => self.failure_acknowledged,
            _ => false,
        }
    }

    // ── Mutation (capture service only) ──────────────────────────────────

    pub(crate) fn replace_file(&mut self, file: CapturedFile) {
        self.generation += 1;
        self.file = Some(file);
        self.extracted = None;
        self.last_error = None;
        self.failure_acknowledged = false;
        self.status = if self.role.requires_ocr() {
            ExtractionStatus::Processing
        } else {
            ExtractionStatus::Pending
        };
    }

    pub(crate) fn reset(&mut self) {
        self.generation += 1;
        self.file = None;
        self.extracted = None;
        self.last_error = None;
        self.failure_acknowledged = false;
        self.status = ExtractionStatus::Pending;
    }

    pub(crate) fn record_success(&mut self, fields: ExtractedFields) {
        self.extracted = Some(fields);
        self.last_error = None;
        self.status = ExtractionStatus::Succeeded;
    }

    pub(crate) fn record_failure(&mut self, message: String) {
        self.extracted = None;
        self.last_error = Some(message);
        self.status = ExtractionStatus::Failed;
    }

    /// Mark a failed extraction as accepted by the claimant.
    pub(crate) fn acknowledge_failure(&mut self) -> bool {
        if self.status == ExtractionStatus::Failed && self.has_file() {
            self.failure_acknowledged = true;
        }
        self.failure_acknowledged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn photo_roles_know_their_party() {
        assert_eq!(SlotRole::photo(VehiclePhoto::ThirdPartyRear).party(), Party::ThirdParty);
        assert_eq!(SlotRole::photo(VehiclePhoto::Chassis).party(), Party::Owner);
        assert_eq!(SlotRole::registration(Party::ThirdParty).party(), Party::ThirdParty);
        assert_eq!(SlotRole::police_report().party(), Party::Owner);
    }

    #[test]
    fn license_requires_name_and_national_id() {
        let ok = ExtractedFields::from_raw(
            DocumentKind::License,
            &raw(&[("full_name", "Ana Souza"), ("national_id", "12345678900")]),
        );
        assert!(ok.is_valid());

        let blank_id = ExtractedFields::from_raw(
            DocumentKind::License,
            &raw(&[("full_name", "Ana Souza"), ("national_id", "   ")]),
        );
        assert_eq!(blank_id.missing_mandatory(), vec![FIELD_NATIONAL_ID]);
    }

    #[test]
    fn registration_requires_plate_and_registry_number() {
        let fields = ExtractedFields::from_raw(
            DocumentKind::Registration,
            &raw(&[("plate", "ABC1D23"), ("chassis", "9BW")]),
        );
        assert_eq!(fields.missing_mandatory(), vec![FIELD_REGISTRY_NUMBER]);
        match fields {
            ExtractedFields::Registration(r) => assert_eq!(r.chassis.as_deref(), Some("9BW")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn police_report_has_no_mandatory_fields() {
        let fields = ExtractedFields::from_raw(DocumentKind::PoliceReport, &BTreeMap::new());
        assert!(fields.is_valid());
    }

    #[test]
    fn only_license_and_registration_need_ocr() {
        assert!(SlotRole::license(Party::ThirdParty).requires_ocr());
        assert!(SlotRole::registration(Party::Owner).requires_ocr());
        assert!(!SlotRole::police_report().requires_ocr());
        assert!(!SlotRole::photo(VehiclePhoto::Front).requires_ocr());
    }

    #[test]
    fn role_display() {
        assert_eq!(SlotRole::license(Party::ThirdParty).to_string(), "license (third_party)");
        assert_eq!(SlotRole::photo(VehiclePhoto::LeftSide).to_string(), "photo left_side");
    }

    #[test]
    fn empty_slot_is_not_satisfied() {
        let slot = DocumentSlot::new(SlotRole::police_report());
        assert!(!slot.is_satisfied());
        assert!(slot.fingerprint().is_none());
        assert!(slot.extracted_fields().is_none());
    }
}
