//! One claimant's intake session: draft, slots, position and history.
//!
//! [`IntakeSession`] is what the presentation layer drives. Every user action
//! maps to one method: answering a question goes through [`IntakeSession::draft_mut`],
//! picking a file through [`IntakeSession::upload`] or
//! [`IntakeSession::upload_and_extract`], tapping "continue" through
//! [`IntakeSession::advance`].
//!
//! ## Extraction in flight
//!
//! `upload` returns the [`ExtractionJob`] for OCR roles. Awaiting it with
//! [`IntakeSession::run`] borrows the session only immutably through the
//! shared pipeline, so the caller may keep handling events and later hand the
//! result to [`IntakeSession::complete_extraction`]. A result for a file that
//! has since been replaced or cleared is discarded there.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use crate::assembler::{self, SubmissionPackage};
use crate::capture::{ApplyOutcome, DocumentCaptureService, RawFile};
use crate::draft::{ClaimDraft, ManagerSeed};
use crate::error::IntakeError;
use crate::navigator::{self, DraftEffect, Gate, GateBlock, NavigationError, StepState};
use crate::persistence::{PersistenceCollaborator, SubmissionReceipt};
use crate::pipeline::extract::{CompletedExtraction, ExtractionJob, ExtractionPipeline};
use crate::slot::{DocumentSlot, Party, SlotRole};

/// What happened when the claimant tapped "continue".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Moved(StepState),
    Blocked(GateBlock),
    /// Already at the last step; submit instead.
    Terminal,
}

#[derive(Debug, Clone, Copy)]
struct HistoryEntry {
    state: StepState,
    third_party_context: bool,
}

pub struct IntakeSession {
    draft: ClaimDraft,
    capture: DocumentCaptureService,
    state: StepState,
    history: Vec<HistoryEntry>,
    pipeline: Arc<ExtractionPipeline>,
}

impl IntakeSession {
    pub fn new(pipeline: Arc<ExtractionPipeline>) -> Self {
        Self::with_draft(pipeline, ClaimDraft::new())
    }

    /// A session for a claim a manager already opened.
    pub fn from_seed(pipeline: Arc<ExtractionPipeline>, seed: ManagerSeed) -> Self {
        Self::with_draft(pipeline, ClaimDraft::from_seed(seed))
    }

    fn with_draft(pipeline: Arc<ExtractionPipeline>, draft: ClaimDraft) -> Self {
        Self {
            draft,
            capture: DocumentCaptureService::new(),
            state: StepState::default(),
            history: Vec::new(),
            pipeline,
        }
    }

    pub fn draft(&self) -> &ClaimDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut ClaimDraft {
        &mut self.draft
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn capture(&self) -> &DocumentCaptureService {
        &self.capture
    }

    pub fn slot(&self, role: SlotRole) -> Option<&DocumentSlot> {
        self.capture.slot(role)
    }

    /// Slot the current step (or photo substep) writes to.
    pub fn current_slot(&self) -> Option<SlotRole> {
        navigator::required_slot(&self.state, &self.draft)
    }

    // ── Files ────────────────────────────────────────────────────────────

    /// Store a file and, for OCR roles, return the extraction to run.
    pub fn upload(&mut self, role: SlotRole, raw: RawFile) -> Result<Option<ExtractionJob>, IntakeError> {
        self.capture.ingest(role, raw)?;
        Ok(self.capture.dispatch(role))
    }

    /// Upload into the slot of the current step.
    pub fn upload_current(&mut self, raw: RawFile) -> Result<Option<ExtractionJob>, IntakeError> {
        let role = self.current_slot().ok_or_else(|| IntakeError::NoSlotAtStep {
            step: self.state.step.to_string(),
        })?;
        self.upload(role, raw)
    }

    /// Run a dispatched extraction. Does not touch the session.
    pub fn run(&self, job: ExtractionJob) -> impl Future<Output = CompletedExtraction> + 'static {
        let pipeline = Arc::clone(&self.pipeline);
        async move { pipeline.run(job).await }
    }

    pub fn complete_extraction(&mut self, completed: CompletedExtraction) -> ApplyOutcome {
        self.capture.apply(completed)
    }

    /// Upload, extract and apply in one go.
    pub async fn upload_and_extract(&mut self, role: SlotRole, raw: RawFile) -> Result<&DocumentSlot, IntakeError> {
        if let Some(job) = self.upload(role, raw)? {
            let completed = self.run(job).await;
            self.complete_extraction(completed);
        }
        self.capture
            .slot(role)
            .ok_or_else(|| IntakeError::Internal(format!("{role}: slot missing after upload")))
    }

    /// Continue past a failed extraction with manually typed data.
    pub fn acknowledge_failure(&mut self, role: SlotRole) -> bool {
        let accepted = self.capture.acknowledge_failure(role);
        if accepted {
            info!("{role}: claimant continues without automatic reading");
        }
        accepted
    }

    pub fn clear(&mut self, role: SlotRole) -> &DocumentSlot {
        self.capture.clear(role)
    }

    // ── Navigation ───────────────────────────────────────────────────────

    pub fn gate(&self) -> Gate {
        navigator::check_gate(&self.state, &self.draft, &self.capture)
    }

    pub fn can_advance(&self) -> bool {
        self.gate().is_open()
    }

    pub fn is_terminal(&self) -> bool {
        navigator::is_terminal(&self.state, &self.draft)
    }

    pub fn advance(&mut self) -> AdvanceOutcome {
        match navigator::advance(&self.state, &self.draft, &self.capture) {
            Ok(transition) => {
                self.history.push(HistoryEntry {
                    state: self.state,
                    third_party_context: self.draft.third_party_context_active(),
                });
                if let Some(DraftEffect::EnterThirdPartyContext) = transition.effect {
                    info!("Entering third-party documentation pass");
                    self.draft.set_third_party_context(true);
                }
                self.state = transition.next;
                self.clear_abandoned_slots();
                info!("Now at {} (substep {})", self.state.step, self.state.photo_substep);
                AdvanceOutcome::Moved(self.state)
            }
            Err(NavigationError::Blocked { block, .. }) => AdvanceOutcome::Blocked(block),
            Err(NavigationError::Terminal { .. }) => AdvanceOutcome::Terminal,
        }
    }

    /// Return to the previous step.
    ///
    /// Refused while the current step's file is still being read. Leaving
    /// the third-party pass this way restores the owner context and clears
    /// the third party's files; other captured files stay in their slots.
    pub fn back(&mut self) -> bool {
        if let Some(role) = self.current_slot() {
            if self.capture.slot(role).is_some_and(DocumentSlot::is_busy) {
                debug!("Back refused: {role} is still being read");
                return false;
            }
        }
        let Some(entry) = self.history.pop() else {
            return false;
        };
        let leaving_third_party = self.draft.third_party_context_active() && !entry.third_party_context;
        self.draft.set_third_party_context(entry.third_party_context);
        debug!("Back from {} to {}", self.state.step, entry.state.step);
        self.state = entry.state;
        if leaving_third_party {
            self.clear_where(|role| role.party() == Party::ThirdParty);
        }
        self.clear_abandoned_slots();
        true
    }

    /// Clear every populated slot the current answers no longer lead to.
    fn clear_abandoned_slots(&mut self) {
        let draft = &self.draft;
        let abandoned: Vec<SlotRole> = self
            .capture
            .populated()
            .map(DocumentSlot::role)
            .filter(|role| !navigator::slot_reachable(*role, draft))
            .collect();
        for role in abandoned {
            info!("{role}: branch abandoned, discarding its file");
            self.capture.clear(role);
        }
    }

    fn clear_where(&mut self, matches: impl Fn(SlotRole) -> bool) {
        let roles: Vec<SlotRole> = self
            .capture
            .populated()
            .map(DocumentSlot::role)
            .filter(|role| matches(*role))
            .collect();
        for role in roles {
            info!("{role}: leaving the third-party pass, discarding its file");
            self.capture.clear(role);
        }
    }

    // ── Submission ───────────────────────────────────────────────────────

    /// Package the session. Only at a terminal step whose gate is open.
    ///
    /// Files left behind by a branch the answers have since moved away from
    /// are cleared first and never submitted.
    pub fn assemble(&mut self) -> Result<SubmissionPackage, IntakeError> {
        if !self.is_terminal() {
            return Err(IntakeError::NotTerminal {
                step: self.state.step.to_string(),
            });
        }
        if let Gate::Blocked(block) = self.gate() {
            return Err(IntakeError::StepIncomplete {
                step: self.state.step.to_string(),
                reason: block.to_string(),
            });
        }
        self.clear_abandoned_slots();
        assembler::assemble(&self.draft, &self.capture)
    }

    pub async fn submit(&mut self, persistence: &dyn PersistenceCollaborator) -> Result<SubmissionReceipt, IntakeError> {
        let package = self.assemble()?;
        persistence.submit(&package).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntakeConfig;
    use crate::draft::{AttendanceKind, ClaimSubtype};
    use crate::navigator::StepId;
    use crate::pipeline::ocr::{OcrCollaborator, OcrRequest, OcrResponse};
    use crate::pipeline::crop::CropWindow;
    use crate::pipeline::render::PageRenderer;
    use crate::slot::{ExtractionStatus, Party};
    use async_trait::async_trait;
    use image::DynamicImage;

    struct EmptyOcr;

    #[async_trait]
    impl OcrCollaborator for EmptyOcr {
        async fn read(&self, _request: OcrRequest) -> Result<OcrResponse, IntakeError> {
            Ok(OcrResponse::default())
        }
    }

    struct NoRenderer;

    impl PageRenderer for NoRenderer {
        fn render(&self, _pdf: &[u8], _window: Option<&CropWindow>) -> Result<DynamicImage, IntakeError> {
            Err(IntakeError::RenderFailed {
                detail: "not in tests".into(),
            })
        }
    }

    fn session() -> IntakeSession {
        IntakeSession::new(Arc::new(ExtractionPipeline::new(
            Arc::new(EmptyOcr),
            Arc::new(NoRenderer),
            IntakeConfig::default(),
        )))
    }

    fn jpeg() -> RawFile {
        RawFile::new("x.jpg", Some("image/jpeg"), vec![0xFF, 0xD8, 0xFF])
    }

    #[test]
    fn back_restores_position() {
        let mut s = session();
        assert_eq!(s.advance(), AdvanceOutcome::Moved(StepState::at(StepId::AttendanceKind)));
        assert!(matches!(s.advance(), AdvanceOutcome::Blocked(_)));
        s.draft_mut().set_attendance_kind(AttendanceKind::Claim);
        s.advance();
        assert_eq!(s.state().step, StepId::ClaimSubtype);

        assert!(s.back());
        assert!(s.back());
        assert_eq!(s.state().step, StepId::Welcome);
        assert!(!s.back());
    }

    #[test]
    fn back_refused_while_current_file_is_read() {
        let mut s = session();
        s.draft_mut().set_claim_subtype(ClaimSubtype::Collision);
        s.advance();
        s.advance();
        s.advance();
        assert_eq!(s.state().step, StepId::OwnerLicenseCapture);

        let job = s.upload_current(jpeg()).unwrap();
        assert!(job.is_some());
        assert!(!s.back());
        assert_eq!(s.state().step, StepId::OwnerLicenseCapture);

        s.clear(SlotRole::license(Party::Owner));
        assert!(s.back());
        assert_eq!(s.state().step, StepId::ClaimSubtype);
    }

    #[test]
    fn back_out_of_third_party_pass_restores_owner_context() {
        let mut s = session();
        s.draft_mut().set_claim_subtype(ClaimSubtype::Collision);
        s.draft_mut().set_other_vehicles_involved(true);
        s.state = StepState::at(StepId::ThirdPartyQuestion);

        assert!(matches!(s.advance(), AdvanceOutcome::Moved(_)));
        assert!(s.draft().third_party_context_active());
        assert_eq!(s.current_slot(), Some(SlotRole::license(Party::ThirdParty)));

        s.back();
        assert!(!s.draft().third_party_context_active());
        assert_eq!(s.state().step, StepId::ThirdPartyQuestion);
    }

    #[test]
    fn upload_current_needs_a_slot() {
        let mut s = session();
        assert!(matches!(
            s.upload_current(jpeg()),
            Err(IntakeError::NoSlotAtStep { .. })
        ));
    }

    #[tokio::test]
    async fn failed_extraction_can_be_acknowledged() {
        let mut s = session();
        s.draft_mut().set_claim_subtype(ClaimSubtype::Collision);
        s.state = StepState::at(StepId::OwnerLicenseCapture);
        let role = SlotRole::license(Party::Owner);

        let slot = s.upload_and_extract(role, jpeg()).await.unwrap();
        assert_eq!(slot.status(), ExtractionStatus::Failed);
        assert!(slot.last_error().is_some());
        assert!(matches!(s.advance(), AdvanceOutcome::Blocked(GateBlock::ExtractionFailed { .. })));

        assert!(s.acknowledge_failure(role));
        assert_eq!(
            s.advance(),
            AdvanceOutcome::Moved(StepState::at(StepId::OwnerRegistrationCapture))
        );
    }

    #[test]
    fn assemble_refused_before_terminal_step() {
        let mut s = session();
        assert!(matches!(s.assemble(), Err(IntakeError::NotTerminal { .. })));
    }

    #[test]
    fn assemble_refused_until_declaration() {
        let mut s = session();
        s.draft_mut().set_claim_subtype(ClaimSubtype::Collision);
        s.state = StepState::at(StepId::Finalization);
        assert!(matches!(s.assemble(), Err(IntakeError::StepIncomplete { .. })));
        s.draft_mut().set_declaration_accepted(true);
        assert!(s.assemble().is_ok());
    }
}
