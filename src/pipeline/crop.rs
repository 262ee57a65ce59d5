//! Crop strategies for PDF documents.
//!
//! A scanned license and a registration certificate put their key fields in
//! different parts of the page, and a single crop does not reliably capture
//! that region on the first try. Each document kind therefore carries an
//! ordered list of named [`CropStrategy`]s; the retry loop walks the list and
//! always finishes with the uncropped page.
//!
//! Windows are fractions of the rendered page, not pixels, so the same
//! configuration works regardless of DPI or page size.

use crate::capture::MediaKind;
use crate::slot::{DocumentKind, SlotRole};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Rectangular region of a page, expressed as fractions in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropWindow {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl CropWindow {
    pub const FULL: CropWindow = CropWindow {
        left: 0.0,
        top: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Check the window lies inside the page and is not empty.
    pub fn validate(&self) -> Result<(), String> {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !in_unit(self.left) || !in_unit(self.top) {
            return Err(format!("crop origin out of range: {self:?}"));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(format!("crop window is empty: {self:?}"));
        }
        if self.left + self.width > 1.0 + f32::EPSILON || self.top + self.height > 1.0 + f32::EPSILON {
            return Err(format!("crop window exceeds the page: {self:?}"));
        }
        Ok(())
    }

    /// Pixel rectangle `(x, y, w, h)` for an image of the given size.
    ///
    /// Always at least 1×1 and clamped to the image bounds. An empty image
    /// yields an empty rectangle at the origin.
    pub fn pixel_rect(&self, img_width: u32, img_height: u32) -> (u32, u32, u32, u32) {
        if img_width == 0 || img_height == 0 {
            return (0, 0, 0, 0);
        }
        let scale = |frac: f32, total: u32| (frac * total as f32).round() as u32;
        let x = scale(self.left, img_width).min(img_width.saturating_sub(1));
        let y = scale(self.top, img_height).min(img_height.saturating_sub(1));
        let w = scale(self.width, img_width).clamp(1, img_width - x);
        let h = scale(self.height, img_height).clamp(1, img_height - y);
        (x, y, w, h)
    }

    pub fn apply(&self, img: &DynamicImage) -> DynamicImage {
        if img.width() == 0 || img.height() == 0 {
            return img.clone();
        }
        let (x, y, w, h) = self.pixel_rect(img.width(), img.height());
        img.crop_imm(x, y, w, h)
    }
}

/// A named crop tried by one extraction attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropStrategy {
    pub name: String,
    pub window: CropWindow,
}

impl CropStrategy {
    pub fn new(name: impl Into<String>, window: CropWindow) -> Self {
        Self {
            name: name.into(),
            window,
        }
    }
}

/// Ordered crop strategies per OCR-eligible document kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropPlan {
    pub license: Vec<CropStrategy>,
    pub registration: Vec<CropStrategy>,
}

impl Default for CropPlan {
    fn default() -> Self {
        Self {
            license: vec![
                CropStrategy::new("upper-half", CropWindow::new(0.0, 0.0, 1.0, 0.5)),
                CropStrategy::new("lower-half", CropWindow::new(0.0, 0.5, 1.0, 0.5)),
            ],
            registration: vec![
                CropStrategy::new("top-band", CropWindow::new(0.0, 0.0, 1.0, 0.45)),
                CropStrategy::new("middle-band", CropWindow::new(0.0, 0.3, 1.0, 0.45)),
            ],
        }
    }
}

impl CropPlan {
    pub fn strategies_for(&self, kind: DocumentKind) -> &[CropStrategy] {
        match kind {
            DocumentKind::License => &self.license,
            DocumentKind::Registration => &self.registration,
            DocumentKind::PoliceReport => &[],
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.license
            .iter()
            .chain(&self.registration)
            .try_for_each(|s| s.window.validate().map_err(|e| format!("{}: {e}", s.name)))
    }
}

/// How one attempt turns the captured file into an OCR image.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderMode {
    /// Send the image bytes unchanged.
    Passthrough,
    /// Render the whole first page.
    FullPage,
    /// Render the first page and crop it.
    Cropped(CropWindow),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttemptPlan {
    pub strategy: String,
    pub render: RenderMode,
}

pub const STRATEGY_ORIGINAL: &str = "original";
pub const STRATEGY_FULL_PAGE: &str = "full-page";

/// Lay out the attempts for one extraction.
///
/// * PDF for a license or registration: the kind's crop strategies followed by
///   the full page, at most `max_pdf_attempts` entries. When the budget is
///   smaller than the list, crops are dropped first; the full page is always
///   the last attempt.
/// * PDF for any other document: one full-page attempt.
/// * Image: one attempt with the original bytes.
pub fn plan_attempts(
    media: MediaKind,
    role: SlotRole,
    plan: &CropPlan,
    max_pdf_attempts: u32,
) -> Vec<AttemptPlan> {
    let full_page = AttemptPlan {
        strategy: STRATEGY_FULL_PAGE.to_string(),
        render: RenderMode::FullPage,
    };

    match (media, role.document_kind()) {
        (MediaKind::Image, _) => vec![AttemptPlan {
            strategy: STRATEGY_ORIGINAL.to_string(),
            render: RenderMode::Passthrough,
        }],
        (MediaKind::Pdf, Some(kind)) if kind.is_ocr_eligible() => {
            let crops = (max_pdf_attempts.max(1) - 1) as usize;
            plan.strategies_for(kind)
                .iter()
                .take(crops)
                .map(|s| AttemptPlan {
                    strategy: s.name.clone(),
                    render: RenderMode::Cropped(s.window),
                })
                .chain(std::iter::once(full_page))
                .collect()
        }
        (MediaKind::Pdf, _) => vec![full_page],
    }
}
