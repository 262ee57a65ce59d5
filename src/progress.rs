//! Progress-callback trait for extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::IntakeConfigBuilder::progress_callback`] to observe the
//! retry loop: a capture step can show "trying another crop…" while the
//! pipeline works through its strategies.
//!
//! # Example
//!
//! ```rust
//! use claim_intake::{ExtractionProgressCallback, IntakeConfig, SlotRole};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     attempts: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_attempt_start(&self, _role: SlotRole, attempt: u32, total: u32, strategy: &str) {
//!         self.attempts.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("attempt {attempt}/{total} ({strategy})");
//!     }
//! }
//!
//! let config = IntakeConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { attempts: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::slot::SlotRole;
use std::sync::Arc;

/// Called by the extraction pipeline as it works through its attempts.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before the first attempt.
    fn on_extraction_start(&self, role: SlotRole, planned_attempts: u32) {
        let _ = (role, planned_attempts);
    }

    /// Called just before an attempt renders and calls the OCR collaborator.
    ///
    /// # Arguments
    /// * `attempt`  — 1-based attempt number
    /// * `total`    — attempts planned for this file
    /// * `strategy` — crop strategy name (`full-page`, `original`, …)
    fn on_attempt_start(&self, role: SlotRole, attempt: u32, total: u32, strategy: &str) {
        let _ = (role, attempt, total, strategy);
    }

    /// Called when an attempt is rejected; the loop may still continue.
    fn on_attempt_failed(&self, role: SlotRole, attempt: u32, reason: &str) {
        let _ = (role, attempt, reason);
    }

    /// Called once when the extraction finishes either way.
    fn on_extraction_complete(&self, role: SlotRole, succeeded: bool, attempts: u32) {
        let _ = (role, succeeded, attempts);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::IntakeConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
