//! OpenAI adapter: chat completions, DALL·E images and TTS.
//!
//! The chat helpers are shared with other OpenAI-compatible endpoints
//! (see [`super::xai`]).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{
    catalog, ensure_success, require_key, transport, ImageOutput, ImageTask, Provider, SpeechTask,
    TextTask,
};
use crate::config::ProviderSettings;
use crate::errors::ProviderError;

pub const DEFAULT_TEXT_MODEL: &str = "gpt-4o";
pub const IMAGE_MODEL: &str = "dall-e-3";
pub const SPEECH_MODEL: &str = "tts-1-hd";
pub const VOICES: [&str; 6] = ["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

const IMAGE_SIZES: [(u32, u32); 3] = [(1024, 1024), (1792, 1024), (1024, 1792)];
const IMAGE_PROMPT_SUFFIX: &str = "ultra high quality, 8K resolution, professional photography, crisp details, sharp focus, vibrant colors, masterpiece quality";

pub struct OpenAiProvider {
    client: Client,
    settings: ProviderSettings,
}

impl OpenAiProvider {
    pub fn new(client: Client, settings: ProviderSettings) -> Self {
        Self { client, settings }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url, path)
    }
}

#[async_trait]
impl Provider<TextTask> for OpenAiProvider {
    fn id(&self) -> &'static str {
        catalog::OPENAI
    }

    fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    fn model(&self, task: &TextTask) -> String {
        task.model
            .clone()
            .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string())
    }

    async fn generate(&self, task: &TextTask) -> Result<String, ProviderError> {
        let model = Provider::<TextTask>::model(self, task);
        chat_completion(&self.client, &self.settings, &model, task).await
    }
}

#[async_trait]
impl Provider<ImageTask> for OpenAiProvider {
    fn id(&self) -> &'static str {
        catalog::OPENAI
    }

    fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    fn model(&self, _task: &ImageTask) -> String {
        IMAGE_MODEL.to_string()
    }

    async fn generate(&self, task: &ImageTask) -> Result<ImageOutput, ProviderError> {
        let key = require_key(&self.settings)?;
        let payload = json!({
            "model": IMAGE_MODEL,
            "prompt": format!("{}, {IMAGE_PROMPT_SUFFIX}", task.prompt),
            "n": 1,
            "size": image_size(task.width, task.height),
            "quality": "hd",
            "style": "vivid",
        });
        let response = self
            .client
            .post(self.endpoint("images/generations"))
            .bearer_auth(key)
            .json(&payload)
            .send()
            .await
            .map_err(transport(catalog::OPENAI))?;
        let body: Value = ensure_success(catalog::OPENAI, response)
            .await?
            .json()
            .await
            .map_err(transport(catalog::OPENAI))?;
        parse_image_url(&body).map(|url| ImageOutput { url })
    }
}

#[async_trait]
impl Provider<SpeechTask> for OpenAiProvider {
    fn id(&self) -> &'static str {
        catalog::OPENAI
    }

    fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    fn model(&self, _task: &SpeechTask) -> String {
        SPEECH_MODEL.to_string()
    }

    async fn generate(&self, task: &SpeechTask) -> Result<Vec<u8>, ProviderError> {
        let key = require_key(&self.settings)?;
        // Voices outside VOICES are passed through; the API rejects them.
        let payload = json!({
            "model": SPEECH_MODEL,
            "voice": task.voice,
            "input": task.text,
        });
        let response = self
            .client
            .post(self.endpoint("audio/speech"))
            .bearer_auth(key)
            .json(&payload)
            .send()
            .await
            .map_err(transport(catalog::OPENAI))?;
        let audio = ensure_success(catalog::OPENAI, response)
            .await?
            .bytes()
            .await
            .map_err(transport(catalog::OPENAI))?;
        if audio.is_empty() {
            return Err(ProviderError::EmptyResult {
                provider: catalog::OPENAI,
            });
        }
        Ok(audio.to_vec())
    }
}

/// Single-turn chat completion against an OpenAI-compatible endpoint.
pub(crate) async fn chat_completion(
    client: &Client,
    settings: &ProviderSettings,
    model: &str,
    task: &TextTask,
) -> Result<String, ProviderError> {
    let key = require_key(settings)?;
    let payload = json!({
        "model": model,
        "messages": [{"role": "user", "content": task.prompt}],
        "temperature": task.temperature,
    });
    let response = client
        .post(format!("{}/chat/completions", settings.base_url))
        .bearer_auth(key)
        .json(&payload)
        .send()
        .await
        .map_err(transport(settings.id))?;
    let body: Value = ensure_success(settings.id, response)
        .await?
        .json()
        .await
        .map_err(transport(settings.id))?;
    parse_chat_content(settings.id, &body)
}

pub(crate) fn parse_chat_content(provider: &'static str, body: &Value) -> Result<String, ProviderError> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or(ProviderError::EmptyResult { provider })
}

fn parse_image_url(body: &Value) -> Result<String, ProviderError> {
    body.pointer("/data/0/url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or(ProviderError::EmptyResult {
            provider: catalog::OPENAI,
        })
}

/// DALL·E 3 only accepts three sizes; anything else falls back to square.
fn image_size(width: u32, height: u32) -> String {
    let (w, h) = IMAGE_SIZES
        .iter()
        .copied()
        .find(|size| *size == (width, height))
        .unwrap_or(IMAGE_SIZES[0]);
    format!("{w}x{h}")
}
