//! Upstream provider adapters.
//!
//! Each adapter wraps exactly one HTTP call per `generate` and implements
//! [`Provider`] for every generation task it can serve. The
//! [`ProviderRegistry`] turns the catalogue's static fallback order into typed
//! chains that the dispatcher walks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;

use crate::config::{AppConfig, ProviderSettings};
use crate::errors::ProviderError;
use crate::records::GenerationKind;
use crate::voices::VoiceSource;

pub mod catalog;
pub mod elevenlabs;
pub mod openai;
pub mod stability;
pub mod xai;

pub use elevenlabs::ElevenLabsProvider;
pub use openai::OpenAiProvider;
pub use stability::StabilityProvider;
pub use xai::XaiProvider;

pub const DEFAULT_TEMPERATURE: f64 = 0.8;
pub const DEFAULT_IMAGE_SIZE: u32 = 1024;
pub const DEFAULT_VOICE: &str = "alloy";

/// A unit of work one provider chain can fulfil.
pub trait GenerationTask: Send + Sync + 'static {
    const KIND: GenerationKind;
    type Output: Send + 'static;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextTask {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub temperature: f64,
}

impl GenerationTask for TextTask {
    const KIND: GenerationKind = GenerationKind::Text;
    type Output = String;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageTask {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageOutput {
    pub url: String,
}

impl GenerationTask for ImageTask {
    const KIND: GenerationKind = GenerationKind::Image;
    type Output = ImageOutput;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechTask {
    pub text: String,
    pub voice: String,
}

impl GenerationTask for SpeechTask {
    const KIND: GenerationKind = GenerationKind::Speech;
    type Output = Vec<u8>;
}

/// Generation capability of a single upstream service for task `T`.
#[async_trait]
pub trait Provider<T: GenerationTask>: Send + Sync {
    fn id(&self) -> &'static str;

    /// False when the credential is absent; such providers are skipped
    /// without any network call.
    fn is_configured(&self) -> bool;

    /// Model identifier this provider will use for `task`.
    fn model(&self, task: &T) -> String;

    async fn generate(&self, task: &T) -> Result<T::Output, ProviderError>;
}

pub type ProviderChain<T> = Vec<Arc<dyn Provider<T>>>;

/// Ordered provider chains per generation kind.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    pub text: ProviderChain<TextTask>,
    pub image: ProviderChain<ImageTask>,
    pub speech: ProviderChain<SpeechTask>,
    pub voices: Option<Arc<dyn VoiceSource>>,
}

impl ProviderRegistry {
    /// Build the production chains in catalogue order from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = build_client(config.provider_timeout)?;
        let openai = Arc::new(OpenAiProvider::new(
            client.clone(),
            config.provider(catalog::OPENAI),
        ));
        let xai = Arc::new(XaiProvider::new(client.clone(), config.provider(catalog::XAI)));
        let stability = Arc::new(StabilityProvider::new(
            client.clone(),
            config.provider(catalog::STABILITY),
        ));
        let elevenlabs = Arc::new(ElevenLabsProvider::new(
            client,
            config.provider(catalog::ELEVENLABS),
        ));

        let voices = if elevenlabs.is_configured() {
            Some(elevenlabs.clone() as Arc<dyn VoiceSource>)
        } else {
            None
        };

        let mut registry = Self {
            voices,
            ..Self::default()
        };
        for id in catalog::fallback_order(GenerationKind::Text) {
            match *id {
                catalog::XAI => registry.text.push(xai.clone()),
                catalog::OPENAI => registry.text.push(openai.clone()),
                _ => {}
            }
        }
        for id in catalog::fallback_order(GenerationKind::Image) {
            match *id {
                catalog::STABILITY => registry.image.push(stability.clone()),
                catalog::OPENAI => registry.image.push(openai.clone()),
                _ => {}
            }
        }
        for id in catalog::fallback_order(GenerationKind::Speech) {
            match *id {
                catalog::ELEVENLABS => registry.speech.push(elevenlabs.clone()),
                catalog::OPENAI => registry.speech.push(openai.clone()),
                _ => {}
            }
        }
        Ok(registry)
    }

    pub fn chain_ids(&self, kind: GenerationKind) -> Vec<&'static str> {
        match kind {
            GenerationKind::Text => self.text.iter().map(|p| p.id()).collect(),
            GenerationKind::Image => self.image.iter().map(|p| p.id()).collect(),
            GenerationKind::Speech => self.speech.iter().map(|p| p.id()).collect(),
        }
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .user_agent(concat!("GenStudio/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to construct HTTP client")
}

pub(crate) fn require_key(settings: &ProviderSettings) -> Result<&str, ProviderError> {
    settings
        .api_key
        .as_deref()
        .ok_or(ProviderError::MissingCredentials {
            provider: settings.id,
        })
}

pub(crate) fn transport(provider: &'static str) -> impl FnOnce(reqwest::Error) -> ProviderError {
    move |source| ProviderError::Transport { provider, source }
}

/// Pass successful responses through; turn anything else into
/// [`ProviderError::Upstream`] carrying the upstream message.
pub(crate) async fn ensure_success(
    provider: &'static str,
    response: Response,
) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Upstream {
        provider,
        status: status.as_u16(),
        message: upstream_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
    })
}

/// Best-effort extraction of an error message from an upstream body.
pub(crate) fn upstream_message(body: &str) -> Option<String> {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let candidates = [
            json.pointer("/error/message"),
            json.pointer("/detail/message"),
            json.get("message"),
            json.get("error"),
            json.get("detail"),
        ];
        for candidate in candidates.into_iter().flatten() {
            if let Some(text) = candidate.as_str() {
                return Some(text.to_string());
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(300).collect())
    }
}
