//! Configuration for document extraction and submission.
//!
//! All tunable behaviour lives in [`IntakeConfig`], built via its
//! [`IntakeConfigBuilder`]. The crop windows in particular are configuration
//! rather than code: they were tuned against real scans and are expected to
//! be re-tuned without touching the retry loop.

use crate::error::IntakeError;
use crate::pipeline::crop::{CropPlan, CropStrategy};
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Hard ceiling for the PDF retry budget.
pub const MAX_PDF_ATTEMPTS_LIMIT: u32 = 5;

/// Configuration for an intake session's pipeline and collaborators.
///
/// # Example
/// ```rust
/// use claim_intake::IntakeConfig;
///
/// let config = IntakeConfig::builder()
///     .model("gpt-4.1-mini")
///     .max_pdf_attempts(3)
///     .persistence_url("https://claims.example.com/api/submissions")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_pdf_attempts, 3);
/// ```
#[derive(Clone)]
pub struct IntakeConfig {
    /// Longest edge, in pixels, of a rendered PDF page. Default: 1600.
    ///
    /// Identity documents are small; 1600 px keeps the fine print legible
    /// while staying well under provider upload limits.
    pub max_rendered_pixels: u32,

    /// Attempts for a license or registration PDF, full-page fallback
    /// included. Range: 1–5. Default: 3.
    pub max_pdf_attempts: u32,

    /// Ordered crop strategies per document kind.
    pub crop_plan: CropPlan,

    /// Vision model identifier, e.g. "gpt-4.1-mini". If None, uses provider default.
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for OCR calls. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens per OCR reply. Default: 1024.
    pub max_tokens: usize,

    /// Per OCR call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// PDF user password for encrypted scans.
    pub password: Option<String>,

    /// Explicit directory containing libpdfium. If None, the system library is used.
    pub pdfium_library_path: Option<PathBuf>,

    /// Endpoint receiving the multipart submission.
    pub persistence_url: Option<String>,

    /// Submission HTTP timeout in seconds. Default: 120.
    pub persistence_timeout_secs: u64,

    /// Extraction progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_rendered_pixels: 1600,
            max_pdf_attempts: 3,
            crop_plan: CropPlan::default(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 1024,
            api_timeout_secs: 60,
            password: None,
            pdfium_library_path: None,
            persistence_url: None,
            persistence_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IntakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeConfig")
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("max_pdf_attempts", &self.max_pdf_attempts)
            .field("crop_plan", &self.crop_plan)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("persistence_url", &self.persistence_url)
            .field("persistence_timeout_secs", &self.persistence_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl IntakeConfig {
    pub fn builder() -> IntakeConfigBuilder {
        IntakeConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`IntakeConfig`].
#[derive(Debug)]
pub struct IntakeConfigBuilder {
    config: IntakeConfig,
}

impl IntakeConfigBuilder {
    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(200);
        self
    }

    pub fn max_pdf_attempts(mut self, n: u32) -> Self {
        self.config.max_pdf_attempts = n;
        self
    }

    pub fn crop_plan(mut self, plan: CropPlan) -> Self {
        self.config.crop_plan = plan;
        self
    }

    pub fn license_crops(mut self, strategies: Vec<CropStrategy>) -> Self {
        self.config.crop_plan.license = strategies;
        self
    }

    pub fn registration_crops(mut self, strategies: Vec<CropStrategy>) -> Self {
        self.config.crop_plan.registration = strategies;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn persistence_url(mut self, url: impl Into<String>) -> Self {
        self.config.persistence_url = Some(url.into());
        self
    }

    pub fn persistence_timeout_secs(mut self, secs: u64) -> Self {
        self.config.persistence_timeout_secs = secs.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IntakeConfig, IntakeError> {
        let c = &self.config;
        if c.max_pdf_attempts == 0 || c.max_pdf_attempts > MAX_PDF_ATTEMPTS_LIMIT {
            return Err(IntakeError::InvalidConfig(format!(
                "max_pdf_attempts must be 1–{MAX_PDF_ATTEMPTS_LIMIT}, got {}",
                c.max_pdf_attempts
            )));
        }
        c.crop_plan.validate().map_err(IntakeError::InvalidConfig)?;
        if let Some(url) = &c.persistence_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(IntakeError::InvalidConfig(format!(
                    "persistence_url must be an HTTP(S) URL, got '{url}'"
                )));
            }
        }
        Ok(self.config)
    }
}
