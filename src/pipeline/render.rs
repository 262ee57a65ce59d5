//! PDF rasterisation: render the first page to a `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! [`render_page`] moves the work onto tokio's blocking pool so the session's
//! event loop keeps serving other slots while a scan renders.
//!
//! Identity documents are single-page; only the first page is ever rendered.

use crate::error::IntakeError;
use crate::pipeline::crop::CropWindow;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Turns PDF bytes into an image of the first page, optionally cropped.
pub trait PageRenderer: Send + Sync {
    fn render(&self, pdf: &[u8], window: Option<&CropWindow>) -> Result<DynamicImage, IntakeError>;
}

/// Run a renderer on the blocking pool.
pub async fn render_page(
    renderer: Arc<dyn PageRenderer>,
    pdf: Arc<[u8]>,
    window: Option<CropWindow>,
) -> Result<DynamicImage, IntakeError> {
    tokio::task::spawn_blocking(move || renderer.render(&pdf, window.as_ref()))
        .await
        .map_err(|e| IntakeError::Internal(format!("Render task panicked: {}", e)))?
}

/// [`PageRenderer`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    max_pixels: u32,
    password: Option<String>,
    library_path: Option<PathBuf>,
}

impl PdfiumRenderer {
    pub fn new(max_pixels: u32) -> Self {
        Self {
            max_pixels,
            password: None,
            library_path: None,
        }
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn with_library_path(mut self, path: Option<PathBuf>) -> Self {
        self.library_path = path;
        self
    }

    fn bind(&self) -> Result<Pdfium, IntakeError> {
        let bindings = match &self.library_path {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| IntakeError::PdfiumBindingFailed(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render(&self, pdf: &[u8], window: Option<&CropWindow>) -> Result<DynamicImage, IntakeError> {
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_byte_slice(pdf, self.password.as_deref())
            .map_err(|e| IntakeError::RenderFailed {
                detail: format!("could not open PDF: {:?}", e),
            })?;

        let pages = document.pages();
        if pages.len() == 0 {
            return Err(IntakeError::RenderFailed {
                detail: "PDF has no pages".to_string(),
            });
        }

        let page = pages.get(0).map_err(|e| IntakeError::RenderFailed {
            detail: format!("{:?}", e),
        })?;

        let render_config = PdfRenderConfig::new()
            .set_target_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| IntakeError::RenderFailed {
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!("Rendered first page → {}x{} px", image.width(), image.height());

        Ok(match window {
            Some(w) => {
                let cropped = w.apply(&image);
                debug!("Cropped to {}x{} px", cropped.width(), cropped.height());
                cropped
            }
            None => image,
        })
    }
}
