//! Collaborator fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use claim_intake::{
    AdvanceOutcome, CropWindow, DocumentKind, ExtractionPipeline, IntakeConfig, IntakeError,
    IntakeSession, OcrCollaborator, OcrRequest, OcrResponse, PageRenderer, Party,
    PersistenceCollaborator, RawFile, StepId, SubmissionPackage, SubmissionReceipt,
};
use image::{DynamicImage, Rgba, RgbaImage};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Reads every document successfully; names depend on the party so the
/// owner's and the third party's records can be told apart.
#[derive(Default)]
pub struct FakeOcr {
    pub calls: AtomicUsize,
    /// When set, every call answers `success = false`.
    pub reject_all: bool,
}

impl FakeOcr {
    pub fn rejecting() -> Self {
        Self {
            reject_all: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn owner_name(party: Party) -> &'static str {
    match party {
        Party::Owner => "Ana Souza",
        Party::ThirdParty => "Bruno Lima",
    }
}

#[async_trait]
impl OcrCollaborator for FakeOcr {
    async fn read(&self, request: OcrRequest) -> Result<OcrResponse, IntakeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_all {
            return Ok(OcrResponse {
                success: false,
                fields: BTreeMap::new(),
                message: Some("not a document".into()),
            });
        }
        let pairs: Vec<(&str, &str)> = match request.kind {
            DocumentKind::License => vec![
                ("full_name", owner_name(request.party)),
                ("national_id", "12345678900"),
            ],
            DocumentKind::Registration => vec![("plate", "ABC1D23"), ("registry_number", "00998877665")],
            DocumentKind::PoliceReport => vec![("report_number", "2024-0001")],
        };
        Ok(OcrResponse {
            success: true,
            fields: pairs.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            message: None,
        })
    }
}

/// Renders a blank page and counts calls.
#[derive(Default)]
pub struct BlankRenderer {
    pub calls: AtomicUsize,
}

impl PageRenderer for BlankRenderer {
    fn render(&self, _pdf: &[u8], window: Option<&CropWindow>) -> Result<DynamicImage, IntakeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let page = DynamicImage::ImageRgba8(RgbaImage::from_pixel(60, 40, Rgba([255, 255, 255, 255])));
        Ok(window.map_or(page.clone(), |w| w.apply(&page)))
    }
}

/// Records what it was asked to submit.
#[derive(Default)]
pub struct RecordingPersistence {
    pub submissions: Mutex<Vec<(Vec<String>, String)>>,
}

#[async_trait]
impl PersistenceCollaborator for RecordingPersistence {
    async fn submit(&self, package: &SubmissionPackage) -> Result<SubmissionReceipt, IntakeError> {
        let keys = package.file_keys().into_iter().map(str::to_string).collect();
        let payload = package.payload_json()?;
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push((keys, payload));
        Ok(SubmissionReceipt {
            claim_reference: format!("SIN-{:04}", submissions.len()),
        })
    }
}

/// Route library logs to the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn session_with(ocr: Arc<FakeOcr>, renderer: Arc<BlankRenderer>) -> IntakeSession {
    IntakeSession::new(Arc::new(ExtractionPipeline::new(ocr, renderer, IntakeConfig::default())))
}

pub fn session() -> IntakeSession {
    session_with(Arc::new(FakeOcr::default()), Arc::new(BlankRenderer::default()))
}

pub fn jpeg(name: &str) -> RawFile {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend_from_slice(name.as_bytes());
    RawFile::new(name, Some("image/jpeg"), bytes)
}

pub fn pdf(name: &str) -> RawFile {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.extend_from_slice(name.as_bytes());
    RawFile::new(name, None, bytes)
}

/// Advance and return the new step, failing the test if the move is refused.
pub fn step(session: &mut IntakeSession) -> StepId {
    match session.advance() {
        AdvanceOutcome::Moved(state) => state.step,
        other => panic!("expected to move from {:?}, got {other:?}", session.state()),
    }
}

/// Upload into the current step's slot and run its extraction to completion.
pub async fn capture_current(session: &mut IntakeSession, raw: RawFile) {
    if let Some(job) = session.upload_current(raw).unwrap() {
        let done = session.run(job).await;
        session.complete_extraction(done);
    }
}
