use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64_ENGINE;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{catalog, ensure_success, require_key, transport, ImageOutput, ImageTask, Provider};
use crate::config::ProviderSettings;
use crate::errors::ProviderError;

pub const ENGINE: &str = "stable-diffusion-xl-1024-v1-0";

#[derive(Debug, Deserialize)]
struct StabilityResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    base64: String,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Stability AI SDXL text-to-image.
pub struct StabilityProvider {
    client: Client,
    settings: ProviderSettings,
}

impl StabilityProvider {
    pub fn new(client: Client, settings: ProviderSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl Provider<ImageTask> for StabilityProvider {
    fn id(&self) -> &'static str {
        catalog::STABILITY
    }

    fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    fn model(&self, _task: &ImageTask) -> String {
        ENGINE.to_string()
    }

    async fn generate(&self, task: &ImageTask) -> Result<ImageOutput, ProviderError> {
        let key = require_key(&self.settings)?;
        let payload = json!({
            "text_prompts": [{"text": task.prompt, "weight": 1}],
            "cfg_scale": 7,
            "width": task.width,
            "height": task.height,
            "steps": 30,
            "samples": 1,
            "style_preset": "enhance",
        });
        let url = format!(
            "{}/v1/generation/{ENGINE}/text-to-image",
            self.settings.base_url
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(key)
            .header("Accept", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(transport(catalog::STABILITY))?;
        let body: StabilityResponse = ensure_success(catalog::STABILITY, response)
            .await?
            .json()
            .await
            .map_err(transport(catalog::STABILITY))?;
        first_artifact_url(body).map(|url| ImageOutput { url })
    }
}

/// Turn the first usable artifact into an inline PNG data URL.
fn first_artifact_url(body: StabilityResponse) -> Result<String, ProviderError> {
    let empty = ProviderError::EmptyResult {
        provider: catalog::STABILITY,
    };
    let artifact = body.artifacts.into_iter().next().ok_or(empty)?;
    if artifact.finish_reason.as_deref() == Some("ERROR") {
        return Err(ProviderError::EmptyResult {
            provider: catalog::STABILITY,
        });
    }
    match B64_ENGINE.decode(artifact.base64.as_bytes()) {
        Ok(bytes) if !bytes.is_empty() => Ok(format!("data:image/png;base64,{}", artifact.base64)),
        _ => Err(ProviderError::EmptyResult {
            provider: catalog::STABILITY,
        }),
    }
}
