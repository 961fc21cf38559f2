//! Local directory for generated media, served under `/uploads`.

use std::path::{Path, PathBuf};

use crate::errors::GenError;

pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write the audio of generation `id` and return its public URL.
    pub async fn save_speech(&self, id: i64, audio: &[u8]) -> Result<String, GenError> {
        self.save(&format!("speech_{id}.mp3"), audio).await
    }

    async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<String, GenError> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(file_name), bytes).await?;
        log::debug!(
            "stored {} bytes at {}",
            bytes.len(),
            self.root.join(file_name).display()
        );
        Ok(format!("{PUBLIC_PREFIX}/{file_name}"))
    }
}
