//! The OCR collaborator: request/response contract plus a vision-model adapter.
//!
//! The pipeline only depends on [`OcrCollaborator`]. [`VisionOcr`] implements
//! it on top of `edgequake-llm`, so any vision provider the factory knows
//! (OpenAI, Anthropic, Gemini, Ollama, …) can read documents. Tests and other
//! deployments plug in their own implementation.

use crate::config::IntakeConfig;
use crate::error::IntakeError;
use crate::pipeline::postprocess::parse_ocr_reply;
use crate::prompts;
use crate::slot::{DocumentKind, Party};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// One image sent for reading.
#[derive(Debug, Clone)]
pub struct OcrRequest {
    pub kind: DocumentKind,
    pub party: Party,
    pub image: ImageData,
}

/// What the collaborator read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrResponse {
    pub success: bool,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// External service that reads structured fields off a document image.
///
/// An `Err` means the call itself failed (unreachable, timed out, garbled);
/// a readable-but-wrong document is `Ok` with `success = false`.
#[async_trait]
pub trait OcrCollaborator: Send + Sync {
    async fn read(&self, request: OcrRequest) -> Result<OcrResponse, IntakeError>;
}

/// [`OcrCollaborator`] backed by a vision LLM.
pub struct VisionOcr {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
}

impl VisionOcr {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &IntakeConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve the provider from the configuration and environment.
    pub fn from_config(config: &IntakeConfig) -> Result<Self, IntakeError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl OcrCollaborator for VisionOcr {
    async fn read(&self, request: OcrRequest) -> Result<OcrResponse, IntakeError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(prompts::system_prompt(request.kind)),
            ChatMessage::user_with_images(
                prompts::user_instruction(request.kind, request.party),
                vec![request.image],
            ),
        ];
        let options = self.options();

        let response = timeout(
            Duration::from_secs(self.timeout_secs),
            self.provider.chat(&messages, Some(&options)),
        )
        .await
        .map_err(|_| IntakeError::Timeout {
            service: "OCR service".to_string(),
            secs: self.timeout_secs,
        })?
        .map_err(|e| IntakeError::Transport {
            service: "OCR service".to_string(),
            detail: e.to_string(),
        })?;

        debug!(
            "{:?}: {} input tokens, {} output tokens, {:?}",
            request.kind,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        parse_ocr_reply(request.kind, &response.content)
    }
}

fn create_vision_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, IntakeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        IntakeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the vision provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`)
/// 2. **Named provider + model** (`config.provider_name`)
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`)
/// 4. **Full auto-detection** (`ProviderFactory::from_env`)
pub fn resolve_provider(config: &IntakeConfig) -> Result<Arc<dyn LLMProvider>, IntakeError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| IntakeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
