//! The claim draft: every answer collected during one intake session.
//!
//! Fields are private and changed only through setters, which also reset
//! answers that no longer apply. Switching from a claim to an assistance
//! request forgets the claim subtype, answering "documents were not stolen"
//! drops a half-filled theft form, and so on. Navigation never sees an answer
//! from a branch the claimant has left.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::slot::Party;

/// What the claimant is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceKind {
    Claim,
    Assistance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimSubtype {
    Collision,
    Theft,
    Robbery,
    MinorRepair,
}

impl ClaimSubtype {
    /// Theft and robbery share the "were your documents taken?" branch.
    pub fn is_theft_like(self) -> bool {
        matches!(self, ClaimSubtype::Theft | ClaimSubtype::Robbery)
    }
}

/// Roadside assistance services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistanceKind {
    Towing,
    BatteryJump,
    TireChange,
    Locksmith,
    FuelDelivery,
    Windshield,
    Transport,
}

impl AssistanceKind {
    pub const ALL: [AssistanceKind; 7] = [
        AssistanceKind::Towing,
        AssistanceKind::BatteryJump,
        AssistanceKind::TireChange,
        AssistanceKind::Locksmith,
        AssistanceKind::FuelDelivery,
        AssistanceKind::Windshield,
        AssistanceKind::Transport,
    ];
}

/// Identity data typed in by hand when the documents were stolen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TheftWithoutDocumentsRecord {
    pub full_name: String,
    pub national_id: String,
    pub plate: String,
}

impl TheftWithoutDocumentsRecord {
    pub fn new(
        full_name: impl Into<String>,
        national_id: impl Into<String>,
        plate: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            national_id: national_id.into(),
            plate: plate.into(),
        }
    }

    /// Names of the fields that are empty after trimming.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("full_name", &self.full_name),
            ("national_id", &self.national_id),
            ("plate", &self.plate),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// A claim opened on the claimant's behalf by a manager.
///
/// Seeded answers are applied through the normal setters, so the usual
/// dependent resets hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerSeed {
    pub attendance_kind: Option<AttendanceKind>,
    pub claim_subtype: Option<ClaimSubtype>,
    pub assistance_subtype: Option<AssistanceKind>,
    pub external_reference: Option<String>,
}

/// The root aggregate of one in-progress submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClaimDraft {
    attendance_kind: Option<AttendanceKind>,
    claim_subtype: Option<ClaimSubtype>,
    assistance_subtype: Option<AssistanceKind>,
    documents_stolen: Option<bool>,
    other_vehicles_involved: Option<bool>,
    additional_assistance_requested: Option<bool>,
    additional_assistance_kinds: BTreeSet<AssistanceKind>,
    third_party_context_active: bool,
    theft_without_documents: Option<TheftWithoutDocumentsRecord>,
    external_reference: Option<String>,
    declaration_accepted: bool,
}

impl ClaimDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// A draft pre-filled from a manager-created claim.
    pub fn from_seed(seed: ManagerSeed) -> Self {
        let mut draft = Self::new();
        if let Some(kind) = seed.attendance_kind {
            draft.set_attendance_kind(kind);
        }
        if let Some(subtype) = seed.claim_subtype {
            draft.set_claim_subtype(subtype);
        }
        if let Some(kind) = seed.assistance_subtype {
            draft.set_assistance_subtype(kind);
        }
        draft.external_reference = seed.external_reference;
        draft
    }

    // ── Getters ──────────────────────────────────────────────────────────

    pub fn attendance_kind(&self) -> Option<AttendanceKind> {
        self.attendance_kind
    }

    pub fn claim_subtype(&self) -> Option<ClaimSubtype> {
        self.claim_subtype
    }

    pub fn assistance_subtype(&self) -> Option<AssistanceKind> {
        self.assistance_subtype
    }

    pub fn documents_stolen(&self) -> Option<bool> {
        self.documents_stolen
    }

    pub fn other_vehicles_involved(&self) -> Option<bool> {
        self.other_vehicles_involved
    }

    pub fn additional_assistance_requested(&self) -> Option<bool> {
        self.additional_assistance_requested
    }

    pub fn additional_assistance_kinds(&self) -> &BTreeSet<AssistanceKind> {
        &self.additional_assistance_kinds
    }

    /// Whether document steps are currently being walked for a third party.
    pub fn third_party_context_active(&self) -> bool {
        self.third_party_context_active
    }

    pub fn theft_without_documents(&self) -> Option<&TheftWithoutDocumentsRecord> {
        self.theft_without_documents.as_ref()
    }

    pub fn external_reference(&self) -> Option<&str> {
        self.external_reference.as_deref()
    }

    pub fn declaration_accepted(&self) -> bool {
        self.declaration_accepted
    }

    /// Party whose documents the capture steps currently write to.
    pub fn active_party(&self) -> Party {
        if self.third_party_context_active {
            Party::ThirdParty
        } else {
            Party::Owner
        }
    }

    pub fn is_theft_like(&self) -> bool {
        self.claim_subtype.is_some_and(ClaimSubtype::is_theft_like)
    }

    /// Theft or robbery with the documents gone: no document capture at all.
    pub fn skips_document_capture(&self) -> bool {
        self.is_theft_like() && self.documents_stolen == Some(true)
    }

    // ── Setters ──────────────────────────────────────────────────────────

    pub fn set_attendance_kind(&mut self, kind: AttendanceKind) {
        if self.attendance_kind == Some(kind) {
            return;
        }
        debug!("attendance kind → {kind:?}");
        self.attendance_kind = Some(kind);
        match kind {
            AttendanceKind::Claim => self.assistance_subtype = None,
            AttendanceKind::Assistance => {
                self.claim_subtype = None;
                self.clear_theft_answers();
                self.other_vehicles_involved = None;
            }
        }
    }

    /// Also marks the draft as a claim.
    pub fn set_claim_subtype(&mut self, subtype: ClaimSubtype) {
        self.set_attendance_kind(AttendanceKind::Claim);
        debug!("claim subtype → {subtype:?}");
        self.claim_subtype = Some(subtype);
        if !subtype.is_theft_like() {
            self.clear_theft_answers();
        }
        if subtype == ClaimSubtype::MinorRepair {
            self.other_vehicles_involved = None;
        }
    }

    /// Also marks the draft as an assistance request.
    pub fn set_assistance_subtype(&mut self, kind: AssistanceKind) {
        self.set_attendance_kind(AttendanceKind::Assistance);
        debug!("assistance subtype → {kind:?}");
        self.assistance_subtype = Some(kind);
    }

    pub fn set_documents_stolen(&mut self, stolen: bool) {
        self.documents_stolen = Some(stolen);
        if !stolen {
            self.theft_without_documents = None;
        }
    }

    pub fn set_other_vehicles_involved(&mut self, involved: bool) {
        self.other_vehicles_involved = Some(involved);
    }

    /// Answer the additional-assistance offer. Declining drops any selection.
    pub fn set_additional_assistance_requested(&mut self, requested: bool) {
        self.additional_assistance_requested = Some(requested);
        if !requested {
            self.additional_assistance_kinds.clear();
        }
    }

    /// Select an extra service; implies the offer was accepted.
    pub fn add_additional_assistance(&mut self, kind: AssistanceKind) {
        self.additional_assistance_requested = Some(true);
        self.additional_assistance_kinds.insert(kind);
    }

    pub fn remove_additional_assistance(&mut self, kind: AssistanceKind) -> bool {
        self.additional_assistance_kinds.remove(&kind)
    }

    pub fn set_theft_without_documents(&mut self, record: TheftWithoutDocumentsRecord) {
        self.theft_without_documents = Some(record);
    }

    pub fn set_declaration_accepted(&mut self, accepted: bool) {
        self.declaration_accepted = accepted;
    }

    pub fn set_external_reference(&mut self, reference: impl Into<String>) {
        self.external_reference = Some(reference.into());
    }

    pub(crate) fn set_third_party_context(&mut self, active: bool) {
        self.third_party_context_active = active;
    }

    fn clear_theft_answers(&mut self) {
        self.documents_stolen = None;
        self.theft_without_documents = None;
    }
}
