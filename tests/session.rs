//! Session behaviour around uploads, extraction results and submission.

mod common;

use claim_intake::{
    AdvanceOutcome, ApplyOutcome, AssistanceKind, AttendanceKind, ClaimSubtype, ExtractionPipeline,
    ExtractionStatus, GateBlock, IntakeConfig, IntakeError, IntakeSession, ManagerSeed, Party, RawFile, SlotRole,
    StepId, StepState, VehiclePhoto,
};
use common::{capture_current, init_tracing, jpeg, pdf, session, session_with, step, BlankRenderer, FakeOcr};
use tokio_test::{assert_err, assert_ok};
use std::sync::Arc;

fn at_owner_license() -> IntakeSession {
    let mut s = session();
    s.draft_mut().set_claim_subtype(ClaimSubtype::Collision);
    step(&mut s);
    step(&mut s);
    step(&mut s);
    assert_eq!(s.state(), StepState::at(StepId::OwnerLicenseCapture));
    s
}

#[tokio::test]
async fn late_result_for_replaced_file_is_discarded() {
    let mut s = at_owner_license();
    let role = SlotRole::license(Party::Owner);

    let first = s.upload(role, jpeg("blurry.jpg")).unwrap().unwrap();
    let second = s.upload(role, jpeg("sharp.jpg")).unwrap().unwrap();
    assert_ne!(first.fingerprint, second.fingerprint);

    let late = s.run(first).await;
    assert_eq!(s.complete_extraction(late), ApplyOutcome::Stale);
    assert_eq!(s.slot(role).unwrap().status(), ExtractionStatus::Processing);
    assert!(matches!(
        s.advance(),
        AdvanceOutcome::Blocked(GateBlock::ExtractionInFlight { .. })
    ));

    let current = s.run(second).await;
    assert_eq!(s.complete_extraction(current), ApplyOutcome::Applied);
    assert_eq!(s.slot(role).unwrap().file().unwrap().file_name(), "sharp.jpg");
    assert_eq!(step(&mut s), StepId::OwnerRegistrationCapture);
}

#[tokio::test]
async fn identical_reupload_still_invalidates_earlier_dispatch() {
    let mut s = at_owner_license();
    let role = SlotRole::license(Party::Owner);

    let first = s.upload(role, jpeg("same.jpg")).unwrap().unwrap();
    let second = s.upload(role, jpeg("same.jpg")).unwrap().unwrap();
    assert_eq!(first.fingerprint.digest, second.fingerprint.digest);

    let late = s.run(first).await;
    assert_eq!(s.complete_extraction(late), ApplyOutcome::Stale);
}

#[tokio::test]
async fn result_after_clear_is_discarded_and_slot_stays_empty() {
    let mut s = at_owner_license();
    let role = SlotRole::license(Party::Owner);

    let job = s.upload(role, jpeg("license.jpg")).unwrap().unwrap();
    let cleared = s.clear(role);
    assert!(!cleared.has_file());
    assert_eq!(cleared.status(), ExtractionStatus::Pending);

    let done = s.run(job).await;
    assert_eq!(s.complete_extraction(done), ApplyOutcome::Stale);
    let slot = s.slot(role).unwrap();
    assert!(slot.extracted_fields().is_none());
    assert!(!slot.has_file());
}

#[tokio::test]
async fn clearing_a_succeeded_slot_resets_it() {
    let mut s = at_owner_license();
    let role = SlotRole::license(Party::Owner);
    let slot = s.upload_and_extract(role, jpeg("license.jpg")).await.unwrap();
    assert_eq!(slot.status(), ExtractionStatus::Succeeded);

    for _ in 0..2 {
        let slot = s.clear(role);
        assert_eq!(slot.status(), ExtractionStatus::Pending);
        assert!(slot.extracted_fields().is_none());
        assert!(slot.file().is_none());
    }
    assert!(matches!(
        s.advance(),
        AdvanceOutcome::Blocked(GateBlock::MissingFile { .. })
    ));
}

#[tokio::test]
async fn pdf_license_that_never_validates_costs_three_calls() {
    let ocr = Arc::new(FakeOcr::rejecting());
    let renderer = Arc::new(BlankRenderer::default());
    let mut s = session_with(ocr.clone(), renderer.clone());
    s.draft_mut().set_claim_subtype(ClaimSubtype::Collision);
    let role = SlotRole::registration(Party::Owner);

    let slot = s.upload_and_extract(role, pdf("crlv.pdf")).await.unwrap();
    assert_eq!(slot.status(), ExtractionStatus::Failed);
    assert!(slot.last_error().unwrap().contains("could not read"));
    assert_eq!(ocr.calls(), 3);
    assert_eq!(renderer.calls.load(std::sync::atomic::Ordering::SeqCst), 3);

    // A re-upload restarts the budget.
    s.upload_and_extract(role, jpeg("crlv.jpg")).await.unwrap();
    assert_eq!(ocr.calls(), 4);
}

#[tokio::test]
async fn police_report_is_stored_without_reading() {
    let ocr = Arc::new(FakeOcr::default());
    let mut s = session_with(ocr.clone(), Arc::new(BlankRenderer::default()));
    let job = s.upload(SlotRole::police_report(), pdf("report.pdf")).unwrap();

    assert!(job.is_none());
    assert_eq!(ocr.calls(), 0);
    let slot = s.slot(SlotRole::police_report()).unwrap();
    assert_eq!(slot.status(), ExtractionStatus::Pending);
    assert!(slot.is_satisfied());
}

#[tokio::test]
async fn unsupported_file_is_rejected_and_slot_untouched() {
    let mut s = at_owner_license();
    let role = SlotRole::license(Party::Owner);
    s.upload_and_extract(role, jpeg("license.jpg")).await.unwrap();

    let err = s
        .upload(role, RawFile::new("notes.txt", Some("text/plain"), b"hello".to_vec()))
        .unwrap_err();
    assert!(matches!(err, IntakeError::UnsupportedMedia { .. }));
    assert_eq!(s.slot(role).unwrap().status(), ExtractionStatus::Succeeded);
}

#[tokio::test]
async fn files_read_from_disk_are_sniffed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan");
    std::fs::write(&path, b"%PDF-1.4 scanned registration").unwrap();

    let raw = RawFile::from_path(&path).await.unwrap();
    let mut s = at_owner_license();
    let job = s.upload_current(raw).unwrap().unwrap();
    assert!(job.file.is_pdf());
    assert_eq!(job.file.media_type(), "application/pdf");
}

#[tokio::test]
async fn seeded_session_still_walks_the_questions() {
    let mut s = IntakeSession::from_seed(
        Arc::new(ExtractionPipeline::new(
            Arc::new(FakeOcr::default()),
            Arc::new(BlankRenderer::default()),
            IntakeConfig::default(),
        )),
        ManagerSeed {
            attendance_kind: Some(AttendanceKind::Claim),
            claim_subtype: Some(ClaimSubtype::Collision),
            assistance_subtype: None,
            external_reference: Some("MGR-77".into()),
        },
    );
    assert_eq!(step(&mut s), StepId::AttendanceKind);
    assert_eq!(step(&mut s), StepId::ClaimSubtype);
    assert_eq!(step(&mut s), StepId::OwnerLicenseCapture);
    assert_eq!(s.draft().external_reference(), Some("MGR-77"));
}

/// Capture owner documents and every owner photo of a collision, ending at
/// the third-party question.
async fn collision_up_to_third_party_question() -> IntakeSession {
    let mut s = at_owner_license();
    capture_current(&mut s, jpeg("license.jpg")).await;
    step(&mut s);
    capture_current(&mut s, jpeg("registration.jpg")).await;
    step(&mut s);
    assert_eq!(step(&mut s), StepId::GuidedPhotos);
    while s.state().step == StepId::GuidedPhotos {
        capture_current(&mut s, jpeg("photo.jpg")).await;
        step(&mut s);
    }
    assert_eq!(s.state().step, StepId::ThirdPartyQuestion);
    s
}

#[tokio::test]
async fn leaving_the_third_party_pass_discards_its_files() {
    init_tracing();
    let mut s = collision_up_to_third_party_question().await;
    s.draft_mut().set_other_vehicles_involved(true);
    assert_eq!(step(&mut s), StepId::OwnerLicenseCapture);
    capture_current(&mut s, jpeg("other-license.jpg")).await;
    let third_party = SlotRole::license(Party::ThirdParty);
    assert_eq!(s.slot(third_party).unwrap().status(), ExtractionStatus::Succeeded);

    assert!(s.back());
    assert_eq!(s.state().step, StepId::ThirdPartyQuestion);
    assert!(!s.slot(third_party).unwrap().has_file());
    assert!(s.slot(SlotRole::license(Party::Owner)).unwrap().has_file());

    s.draft_mut().set_other_vehicles_involved(false);
    assert_eq!(step(&mut s), StepId::AdditionalAssistanceOffer);
    s.draft_mut().set_additional_assistance_requested(false);
    assert_eq!(step(&mut s), StepId::Finalization);
    s.draft_mut().set_declaration_accepted(true);

    let package = assert_ok!(s.assemble());
    assert!(package.file_keys().iter().all(|k| !k.contains("third_party")));
    assert!(!package.payload.third_party_documented);
    assert_eq!(package.payload.other_vehicles_involved, Some(false));
}

#[tokio::test]
async fn switching_to_assistance_discards_claim_files() {
    init_tracing();
    let mut s = at_owner_license();
    capture_current(&mut s, jpeg("license.jpg")).await;
    step(&mut s);
    capture_current(&mut s, jpeg("registration.jpg")).await;
    step(&mut s);
    step(&mut s);
    capture_current(&mut s, jpeg("front.jpg")).await;
    step(&mut s);
    capture_current(&mut s, jpeg("rear.jpg")).await;
    step(&mut s);

    while s.state().step != StepId::AttendanceKind {
        assert!(s.back());
    }
    s.draft_mut().set_assistance_subtype(AssistanceKind::Towing);
    assert_eq!(step(&mut s), StepId::AssistanceSubtype);
    for dropped in [
        SlotRole::registration(Party::Owner),
        SlotRole::photo(VehiclePhoto::Front),
        SlotRole::photo(VehiclePhoto::Rear),
    ] {
        assert!(!s.slot(dropped).unwrap().has_file(), "{dropped}");
    }

    assert_eq!(step(&mut s), StepId::OwnerLicenseCapture);
    assert_eq!(step(&mut s), StepId::AdditionalAssistanceOffer);
    s.draft_mut().set_additional_assistance_requested(false);
    assert_eq!(step(&mut s), StepId::Finalization);
    assert_err!(s.assemble());
    s.draft_mut().set_declaration_accepted(true);

    let package = assert_ok!(s.assemble());
    assert_eq!(package.file_keys(), vec!["file_license_owner_0"]);
}

#[tokio::test]
async fn assembly_skips_files_the_answers_no_longer_reach() {
    let mut s = collision_up_to_third_party_question().await;
    s.draft_mut().set_other_vehicles_involved(false);
    step(&mut s);
    s.draft_mut().set_additional_assistance_requested(false);
    step(&mut s);
    s.draft_mut().set_declaration_accepted(true);

    // A late answer change at the last step, with no further navigation.
    s.draft_mut().set_claim_subtype(ClaimSubtype::MinorRepair);
    let package = assert_ok!(s.assemble());
    let keys = package.file_keys();
    assert!(keys.contains(&"file_photo_vehicle_damage_0"));
    assert!(!keys.contains(&"file_photo_vehicle_front_0"));
    assert!(!keys.contains(&"file_photo_vehicle_rear_0"));
}
