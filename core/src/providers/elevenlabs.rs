use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;

use super::{catalog, ensure_success, require_key, transport, Provider, SpeechTask};
use crate::config::ProviderSettings;
use crate::errors::ProviderError;
use crate::voices::{VoiceInfo, VoiceSource};

pub const MODEL: &str = "eleven_multilingual_v2";

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<VoiceInfo>,
}

/// ElevenLabs text-to-speech and voice listing.
pub struct ElevenLabsProvider {
    client: Client,
    settings: ProviderSettings,
}

impl ElevenLabsProvider {
    pub fn new(client: Client, settings: ProviderSettings) -> Self {
        Self { client, settings }
    }

    /// `{base}/text-to-speech/{voice}` with the voice id escaped as a single
    /// path segment.
    fn speech_url(&self, voice: &str) -> Result<Url, ProviderError> {
        let invalid = || ProviderError::InvalidEndpoint {
            provider: catalog::ELEVENLABS,
            url: self.settings.base_url.clone(),
        };
        let mut url = Url::parse(&self.settings.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .push("text-to-speech")
            .push(voice);
        Ok(url)
    }
}

#[async_trait]
impl Provider<SpeechTask> for ElevenLabsProvider {
    fn id(&self) -> &'static str {
        catalog::ELEVENLABS
    }

    fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    fn model(&self, _task: &SpeechTask) -> String {
        MODEL.to_string()
    }

    async fn generate(&self, task: &SpeechTask) -> Result<Vec<u8>, ProviderError> {
        let key = require_key(&self.settings)?;
        let payload = json!({
            "text": task.text,
            "model_id": MODEL,
            "voice_settings": {
                "stability": 0.75,
                "similarity_boost": 0.85,
                "style": 0.5,
                "use_speaker_boost": true,
            },
        });
        let response = self
            .client
            .post(self.speech_url(&task.voice)?)
            .header("xi-api-key", key)
            .header("Accept", "audio/mpeg")
            .json(&payload)
            .send()
            .await
            .map_err(transport(catalog::ELEVENLABS))?;
        let audio = ensure_success(catalog::ELEVENLABS, response)
            .await?
            .bytes()
            .await
            .map_err(transport(catalog::ELEVENLABS))?;
        if audio.is_empty() {
            return Err(ProviderError::EmptyResult {
                provider: catalog::ELEVENLABS,
            });
        }
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl VoiceSource for ElevenLabsProvider {
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, ProviderError> {
        let key = require_key(&self.settings)?;
        let response = self
            .client
            .get(format!("{}/voices", self.settings.base_url))
            .header("xi-api-key", key)
            .send()
            .await
            .map_err(transport(catalog::ELEVENLABS))?;
        let body: VoicesResponse = ensure_success(catalog::ELEVENLABS, response)
            .await?
            .json()
            .await
            .map_err(transport(catalog::ELEVENLABS))?;
        Ok(body.voices)
    }
}
