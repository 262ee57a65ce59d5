//! Pipeline stages for document field extraction.
//!
//! Each submodule implements one step; [`extract`] strings them together
//! into the bounded retry loop.
//!
//! ## Data Flow
//!
//! ```text
//! CapturedFile ──▶ crop plan ──▶ render ──▶ encode ──▶ ocr ──▶ postprocess ──▶ validate
//!                  (attempts)    (pdfium)   (base64)   (VLM)   (cleanup)       (mandatory)
//! ```
//!
//! 1. [`crop`]   plan the attempts: crop windows for license/registration
//!    PDFs, then the full page; a single pass-through for images
//! 2. [`render`] rasterise the first PDF page; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`encode`] PNG-encode rendered pages, wrap uploaded photos as-is
//! 4. [`ocr`]    the collaborator contract and its vision-model adapter;
//!    the only stage with network I/O
//! 5. [`postprocess`] turn a model reply into a clean field map
//! 6. [`extract`] the retry loop, results and stale-result fingerprints

pub mod crop;
pub mod encode;
pub mod extract;
pub mod ocr;
pub mod postprocess;
pub mod render;
