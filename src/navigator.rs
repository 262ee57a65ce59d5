//! Step navigation: where the claimant goes next, and whether they may go yet.
//!
//! Both [`check_gate`] and [`advance`] are pure functions of the current
//! [`StepState`], the [`ClaimDraft`] and the slots in the
//! [`DocumentCaptureService`]. Neither mutates anything. The one change a
//! transition may ask for, entering the third-party pass, comes back as a
//! [`DraftEffect`] for the session to apply.
//!
//! ## Flow
//!
//! ```text
//! Welcome ─▶ AttendanceKind ─┬─ claim ──────▶ ClaimSubtype ─┬─ theft/robbery ─▶ DocumentsStolen ─┬─ yes ─▶ Offer
//!                            │                              │                                    └─ no ──┐
//!                            │                              └─ collision/minor ─────────────────────────▶│
//!                            └─ assistance ─▶ AssistanceSubtype ────────────────────────────────────────▶ License
//!
//! License ─┬─ assistance ─▶ Offer
//!          └─ claim ──────▶ Registration ─┬─ minor repair / third party ─▶ Photos
//!                                         └─ else ─▶ PoliceReport ─┬─ theft/robbery ─▶ Offer
//!                                                                  └─ collision ─────▶ Photos
//!
//! Photos (n substeps) ─┬─ minor repair / third party ─▶ Offer
//!                      └─ owner pass ─▶ ThirdPartyQuestion ─┬─ yes ─▶ License (third-party pass)
//!                                                           └─ no ──▶ Offer
//!
//! Offer ─▶ Finalization ─┬─ theft/robbery with stolen documents ─▶ TheftWithoutDocumentsForm
//!                        └─ else: terminal
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::capture::DocumentCaptureService;
use crate::draft::{AttendanceKind, ClaimDraft, ClaimSubtype};
use crate::slot::{DocumentKind, ExtractionStatus, Party, SlotRole, VehiclePhoto};

/// Wizard step identifiers. The numbering is stable and shared with clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum StepId {
    Welcome = 1,
    AttendanceKind = 2,
    ClaimSubtype = 3,
    AssistanceSubtype = 4,
    DocumentsStolenQuestion = 5,
    OwnerLicenseCapture = 6,
    OwnerRegistrationCapture = 7,
    PoliceReportCapture = 8,
    GuidedPhotos = 9,
    ThirdPartyQuestion = 10,
    AdditionalAssistanceOffer = 11,
    Finalization = 12,
    TheftWithoutDocumentsForm = 13,
}

impl StepId {
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Steps that hold a document slot. Photos are handled per substep.
    pub fn is_document_capture(self) -> bool {
        matches!(
            self,
            StepId::OwnerLicenseCapture | StepId::OwnerRegistrationCapture | StepId::PoliceReportCapture
        )
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.number())
    }
}

/// The navigator's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepState {
    pub step: StepId,
    /// Index into the photo sequence; meaningful only on [`StepId::GuidedPhotos`].
    pub photo_substep: usize,
}

impl StepState {
    pub fn at(step: StepId) -> Self {
        Self { step, photo_substep: 0 }
    }

    pub fn photo(substep: usize) -> Self {
        Self {
            step: StepId::GuidedPhotos,
            photo_substep: substep,
        }
    }
}

impl Default for StepState {
    fn default() -> Self {
        Self::at(StepId::Welcome)
    }
}

/// One guided photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoSpec {
    pub photo: VehiclePhoto,
    pub mandatory: bool,
}

const fn required(photo: VehiclePhoto) -> PhotoSpec {
    PhotoSpec { photo, mandatory: true }
}

pub const OWNER_PHOTOS: [PhotoSpec; 5] = [
    required(VehiclePhoto::Front),
    required(VehiclePhoto::Rear),
    required(VehiclePhoto::LeftSide),
    required(VehiclePhoto::RightSide),
    required(VehiclePhoto::Damage),
];

pub const THIRD_PARTY_PHOTOS: [PhotoSpec; 3] = [
    required(VehiclePhoto::ThirdPartyFront),
    required(VehiclePhoto::ThirdPartyRear),
    required(VehiclePhoto::ThirdPartyDamage),
];

pub const MINOR_REPAIR_PHOTOS: [PhotoSpec; 2] = [required(VehiclePhoto::Damage), required(VehiclePhoto::Chassis)];

/// Photo sequence for the current pass.
pub fn photo_sequence(draft: &ClaimDraft) -> &'static [PhotoSpec] {
    if draft.claim_subtype() == Some(ClaimSubtype::MinorRepair) {
        &MINOR_REPAIR_PHOTOS
    } else if draft.third_party_context_active() {
        &THIRD_PARTY_PHOTOS
    } else {
        &OWNER_PHOTOS
    }
}

/// The slot a step (or photo substep) writes to, if any.
///
/// License and registration resolve to the active party's slot, so the
/// third-party pass reuses the same steps without touching the owner's files.
pub fn required_slot(state: &StepState, draft: &ClaimDraft) -> Option<SlotRole> {
    let party = draft.active_party();
    match state.step {
        StepId::OwnerLicenseCapture => Some(SlotRole::license(party)),
        StepId::OwnerRegistrationCapture => Some(SlotRole::registration(party)),
        StepId::PoliceReportCapture => Some(SlotRole::police_report()),
        StepId::GuidedPhotos => photo_sequence(draft)
            .get(state.photo_substep)
            .map(|spec| SlotRole::photo(spec.photo)),
        _ => None,
    }
}

/// Whether the current answers still lead through the step that fills
/// `role`.
///
/// Only answers already given rule a slot out: an unanswered question keeps
/// every branch behind it reachable. Slots that become unreachable hold files
/// from an abandoned branch and must not be submitted.
pub fn slot_reachable(role: SlotRole, draft: &ClaimDraft) -> bool {
    if draft.attendance_kind() == Some(AttendanceKind::Assistance) {
        return role == SlotRole::license(Party::Owner);
    }
    let subtype = draft.claim_subtype();
    let is = |s: ClaimSubtype| subtype == Some(s);
    let theft_like = subtype.is_some_and(ClaimSubtype::is_theft_like);

    match role {
        SlotRole::Document {
            party: Party::ThirdParty,
            ..
        } => third_party_reachable(draft),
        SlotRole::Document { kind, .. } => {
            if draft.skips_document_capture() {
                return false;
            }
            match kind {
                DocumentKind::License | DocumentKind::Registration => true,
                DocumentKind::PoliceReport => !is(ClaimSubtype::MinorRepair),
            }
        }
        SlotRole::Photo { photo } => match photo {
            VehiclePhoto::Front | VehiclePhoto::Rear | VehiclePhoto::LeftSide | VehiclePhoto::RightSide => {
                !theft_like && !is(ClaimSubtype::MinorRepair)
            }
            VehiclePhoto::Damage => !theft_like,
            VehiclePhoto::Chassis => subtype.is_none() || is(ClaimSubtype::MinorRepair),
            VehiclePhoto::ThirdPartyFront | VehiclePhoto::ThirdPartyRear | VehiclePhoto::ThirdPartyDamage => {
                third_party_reachable(draft)
            }
        },
    }
}

fn third_party_reachable(draft: &ClaimDraft) -> bool {
    let collision_or_open = matches!(draft.claim_subtype(), None | Some(ClaimSubtype::Collision));
    collision_or_open && draft.other_vehicles_involved() != Some(false)
}

/// Why the current step cannot be left yet.
///
/// This is a normal answer, not a failure: the step shows it and waits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateBlock {
    #[error("the question '{question}' has not been answered")]
    Unanswered { question: &'static str },

    #[error("no file has been provided for {role}")]
    MissingFile { role: SlotRole },

    #[error("{role} is still being read")]
    ExtractionInFlight { role: SlotRole },

    #[error("{role} could not be read; upload it again or continue without automatic reading")]
    ExtractionFailed { role: SlotRole },

    #[error("select at least one additional service, or decline the offer")]
    NoAssistanceSelected,

    #[error("the declaration has not been accepted")]
    DeclarationNotAccepted,

    #[error("missing fields: {}", missing.join(", "))]
    IncompleteTheftRecord { missing: Vec<&'static str> },

    #[error("photo substep {index} does not exist in a sequence of {len}")]
    UnknownSubstep { index: usize, len: usize },
}

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Open,
    Blocked(GateBlock),
}

impl Gate {
    pub fn is_open(&self) -> bool {
        matches!(self, Gate::Open)
    }
}

/// Draft changes a transition requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftEffect {
    EnterThirdPartyContext,
}

/// Result of a successful [`advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: StepState,
    pub effect: Option<DraftEffect>,
}

impl Transition {
    fn to(step: StepId) -> Self {
        Self {
            next: StepState::at(step),
            effect: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("cannot leave {step}: {block}")]
    Blocked { step: StepId, block: GateBlock },

    #[error("{step} is the last step")]
    Terminal { step: StepId },
}

fn answered<T>(value: Option<T>, question: &'static str) -> Gate {
    match value {
        Some(_) => Gate::Open,
        None => Gate::Blocked(GateBlock::Unanswered { question }),
    }
}

fn slot_gate(role: SlotRole, slots: &DocumentCaptureService, mandatory: bool) -> Gate {
    let Some(slot) = slots.slot(role).filter(|s| s.has_file()) else {
        return if mandatory {
            Gate::Blocked(GateBlock::MissingFile { role })
        } else {
            Gate::Open
        };
    };
    if slot.is_satisfied() {
        return Gate::Open;
    }
    match slot.status() {
        ExtractionStatus::Failed => Gate::Blocked(GateBlock::ExtractionFailed { role }),
        _ => Gate::Blocked(GateBlock::ExtractionInFlight { role }),
    }
}

/// Evaluate whether the claimant may leave the current step.
pub fn check_gate(state: &StepState, draft: &ClaimDraft, slots: &DocumentCaptureService) -> Gate {
    match state.step {
        StepId::Welcome => Gate::Open,
        StepId::AttendanceKind => answered(draft.attendance_kind(), "attendance kind"),
        StepId::ClaimSubtype => answered(draft.claim_subtype(), "claim type"),
        StepId::AssistanceSubtype => answered(draft.assistance_subtype(), "assistance type"),
        StepId::DocumentsStolenQuestion => answered(draft.documents_stolen(), "documents stolen"),
        StepId::OwnerLicenseCapture | StepId::OwnerRegistrationCapture => match required_slot(state, draft) {
            Some(role) => slot_gate(role, slots, true),
            None => Gate::Open,
        },
        StepId::PoliceReportCapture => slot_gate(SlotRole::police_report(), slots, draft.is_theft_like()),
        StepId::GuidedPhotos => {
            let sequence = photo_sequence(draft);
            match sequence.get(state.photo_substep) {
                Some(spec) => slot_gate(SlotRole::photo(spec.photo), slots, spec.mandatory),
                None => Gate::Blocked(GateBlock::UnknownSubstep {
                    index: state.photo_substep,
                    len: sequence.len(),
                }),
            }
        }
        StepId::ThirdPartyQuestion => answered(draft.other_vehicles_involved(), "other vehicles involved"),
        StepId::AdditionalAssistanceOffer => match draft.additional_assistance_requested() {
            None => Gate::Blocked(GateBlock::Unanswered {
                question: "additional assistance",
            }),
            Some(true) if draft.additional_assistance_kinds().is_empty() => {
                Gate::Blocked(GateBlock::NoAssistanceSelected)
            }
            Some(_) => Gate::Open,
        },
        StepId::Finalization => {
            if draft.declaration_accepted() {
                Gate::Open
            } else {
                Gate::Blocked(GateBlock::DeclarationNotAccepted)
            }
        }
        StepId::TheftWithoutDocumentsForm => match draft.theft_without_documents() {
            None => Gate::Blocked(GateBlock::IncompleteTheftRecord {
                missing: vec!["full_name", "national_id", "plate"],
            }),
            Some(record) if !record.is_complete() => Gate::Blocked(GateBlock::IncompleteTheftRecord {
                missing: record.missing_fields(),
            }),
            Some(_) => Gate::Open,
        },
    }
}

pub fn can_advance(state: &StepState, draft: &ClaimDraft, slots: &DocumentCaptureService) -> bool {
    check_gate(state, draft, slots).is_open()
}

/// Whether `state` is the last step of this draft's path.
pub fn is_terminal(state: &StepState, draft: &ClaimDraft) -> bool {
    match state.step {
        StepId::Finalization => !draft.skips_document_capture(),
        StepId::TheftWithoutDocumentsForm => true,
        _ => false,
    }
}

/// Compute the next position.
///
/// Fails when the gate is closed or the step is terminal. Answers the gate
/// has already checked are read with a fallback that is never taken.
pub fn advance(
    state: &StepState,
    draft: &ClaimDraft,
    slots: &DocumentCaptureService,
) -> Result<Transition, NavigationError> {
    if let Gate::Blocked(block) = check_gate(state, draft, slots) {
        debug!("{} blocked: {block}", state.step);
        return Err(NavigationError::Blocked { step: state.step, block });
    }
    if is_terminal(state, draft) {
        return Err(NavigationError::Terminal { step: state.step });
    }

    let subtype = draft.claim_subtype();
    let minor_repair = subtype == Some(ClaimSubtype::MinorRepair);
    let third_party = draft.third_party_context_active();

    let transition = match state.step {
        StepId::Welcome => Transition::to(StepId::AttendanceKind),
        StepId::AttendanceKind => match draft.attendance_kind() {
            Some(AttendanceKind::Assistance) => Transition::to(StepId::AssistanceSubtype),
            _ => Transition::to(StepId::ClaimSubtype),
        },
        StepId::ClaimSubtype => {
            if draft.is_theft_like() {
                Transition::to(StepId::DocumentsStolenQuestion)
            } else {
                Transition::to(StepId::OwnerLicenseCapture)
            }
        }
        StepId::AssistanceSubtype => Transition::to(StepId::OwnerLicenseCapture),
        StepId::DocumentsStolenQuestion => {
            if draft.documents_stolen() == Some(true) {
                Transition::to(StepId::AdditionalAssistanceOffer)
            } else {
                Transition::to(StepId::OwnerLicenseCapture)
            }
        }
        StepId::OwnerLicenseCapture => match draft.attendance_kind() {
            Some(AttendanceKind::Assistance) => Transition::to(StepId::AdditionalAssistanceOffer),
            _ => Transition::to(StepId::OwnerRegistrationCapture),
        },
        StepId::OwnerRegistrationCapture => {
            if minor_repair || third_party {
                Transition::to(StepId::GuidedPhotos)
            } else {
                Transition::to(StepId::PoliceReportCapture)
            }
        }
        StepId::PoliceReportCapture => {
            if draft.is_theft_like() {
                Transition::to(StepId::AdditionalAssistanceOffer)
            } else {
                Transition::to(StepId::GuidedPhotos)
            }
        }
        StepId::GuidedPhotos => {
            let last = photo_sequence(draft).len().saturating_sub(1);
            if state.photo_substep < last {
                Transition {
                    next: StepState::photo(state.photo_substep + 1),
                    effect: None,
                }
            } else if minor_repair || third_party {
                Transition::to(StepId::AdditionalAssistanceOffer)
            } else {
                Transition::to(StepId::ThirdPartyQuestion)
            }
        }
        StepId::ThirdPartyQuestion => {
            if draft.other_vehicles_involved() == Some(true) {
                Transition {
                    next: StepState::at(StepId::OwnerLicenseCapture),
                    effect: Some(DraftEffect::EnterThirdPartyContext),
                }
            } else {
                Transition::to(StepId::AdditionalAssistanceOffer)
            }
        }
        StepId::AdditionalAssistanceOffer => Transition::to(StepId::Finalization),
        StepId::Finalization => Transition::to(StepId::TheftWithoutDocumentsForm),
        StepId::TheftWithoutDocumentsForm => return Err(NavigationError::Terminal { step: state.step }),
    };

    debug!(
        "{} → {} (substep {})",
        state.step, transition.next.step, transition.next.photo_substep
    );
    Ok(transition)
}
