//! Voice catalogue for the speech generator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::providers::openai::VOICES as OPENAI_VOICES;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub voice_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Upstream that can enumerate its voices.
#[async_trait]
pub trait VoiceSource: Send + Sync {
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, ProviderError>;
}

/// Built-in voices of the fallback speech provider.
pub fn default_voices() -> Vec<VoiceInfo> {
    OPENAI_VOICES
        .iter()
        .map(|id| VoiceInfo {
            voice_id: id.to_string(),
            name: capitalise(id),
            category: Some("OpenAI".to_string()),
        })
        .collect()
}

/// Voices from `source` when one is configured, otherwise the static list.
pub async fn available_voices(
    source: Option<&dyn VoiceSource>,
) -> Result<Vec<VoiceInfo>, ProviderError> {
    match source {
        Some(source) => source.list_voices().await,
        None => Ok(default_voices()),
    }
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
