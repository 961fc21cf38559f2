use async_trait::async_trait;
use reqwest::Client;

use super::openai::chat_completion;
use super::{catalog, Provider, TextTask};
use crate::config::ProviderSettings;
use crate::errors::ProviderError;

pub const DEFAULT_TEXT_MODEL: &str = "grok-2-1212";

/// xAI Grok through its OpenAI-compatible chat endpoint.
pub struct XaiProvider {
    client: Client,
    settings: ProviderSettings,
}

impl XaiProvider {
    pub fn new(client: Client, settings: ProviderSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl Provider<TextTask> for XaiProvider {
    fn id(&self) -> &'static str {
        catalog::XAI
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
        let model = self.model(task);
        chat_completion(&self.client, &self.settings, &model, task).await
    }
}
