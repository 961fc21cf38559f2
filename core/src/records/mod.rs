//! Generation records and the store abstraction that persists them.
//!
//! Two interchangeable stores are provided: [`MemoryRecordStore`] for
//! ephemeral deployments and [`SqliteRecordStore`] when a database is
//! configured. Both route every mutation through [`GenerationRecord::apply`],
//! so the lifecycle rules (forward-only status, result present exactly when
//! completed) hold no matter which backend is active.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::errors::GenError;

mod memory;
mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

/// Kind of content a generation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Text,
    Image,
    Speech,
}

impl GenerationKind {
    pub const ALL: [GenerationKind; 3] = [Self::Text, Self::Image, Self::Speech];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Speech => "speech",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationKind {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "speech" => Ok(Self::Speech),
            other => Err(GenError::Validation(format!(
                "Unsupported generation type: {other}"
            ))),
        }
    }
}

/// Lifecycle state of a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a record in this state may be moved to `next`.
    ///
    /// Staying in a non-terminal state is allowed so that patches which only
    /// touch other fields can restate the current status. A pending record may
    /// fail directly when it never reached processing.
    pub fn can_advance_to(&self, next: GenerationStatus) -> bool {
        use GenerationStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationStatus {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(GenError::Storage(format!("unknown status '{other}'"))),
        }
    }
}

/// Persisted generation request and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: GenerationKind,
    pub prompt: String,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub parameters: Value,
    pub result: Option<Value>,
    pub status: GenerationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub user_id: Option<i64>,
}

impl GenerationRecord {
    /// Merge `patch` into the record, enforcing the lifecycle rules.
    ///
    /// The record is left untouched when the patch is rejected.
    pub fn apply(&mut self, patch: GenerationPatch) -> Result<(), GenError> {
        if let Some(next) = patch.status {
            if !self.status.can_advance_to(next) {
                return Err(GenError::InvalidTransition {
                    id: self.id,
                    from: self.status,
                    to: next,
                });
            }
        } else if self.status.is_terminal() {
            return Err(GenError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: self.status,
            });
        }

        let mut next = self.clone();
        if let Some(model) = patch.model {
            next.model = Some(model);
        }
        if let Some(provider) = patch.provider {
            next.provider = Some(provider);
        }
        if let Some(parameters) = patch.parameters {
            next.parameters = parameters;
        }
        if let Some(result) = patch.result {
            next.result = Some(result);
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        next.check_coherent()?;
        *self = next;
        Ok(())
    }

    fn check_coherent(&self) -> Result<(), GenError> {
        let completed = self.status == GenerationStatus::Completed;
        if completed != self.result.is_some() {
            return Err(GenError::IncoherentRecord {
                id: self.id,
                status: self.status,
                has_result: self.result.is_some(),
            });
        }
        Ok(())
    }
}

/// Fields supplied when creating a record; the store assigns `id` and
/// `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGeneration {
    pub kind: GenerationKind,
    pub prompt: String,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub parameters: Value,
    pub status: Option<GenerationStatus>,
    pub result: Option<Value>,
    pub user_id: Option<i64>,
}

impl NewGeneration {
    pub fn new(kind: GenerationKind, prompt: impl Into<String>, parameters: Value) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
            model: None,
            provider: None,
            parameters,
            status: None,
            result: None,
            user_id: None,
        }
    }

    pub(crate) fn into_record(
        self,
        id: i64,
        created_at: OffsetDateTime,
    ) -> Result<GenerationRecord, GenError> {
        let record = GenerationRecord {
            id,
            kind: self.kind,
            prompt: self.prompt,
            model: self.model,
            provider: self.provider,
            parameters: self.parameters,
            result: self.result,
            status: self.status.unwrap_or(GenerationStatus::Pending),
            created_at,
            user_id: self.user_id,
        };
        record.check_coherent()?;
        Ok(record)
    }
}

/// Partial update merged into an existing record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationPatch {
    pub model: Option<String>,
    pub provider: Option<String>,
    pub parameters: Option<Value>,
    pub result: Option<Value>,
    pub status: Option<GenerationStatus>,
}

impl GenerationPatch {
    pub fn status(status: GenerationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn completed(provider: &str, model: String, result: Value) -> Self {
        Self {
            model: Some(model),
            provider: Some(provider.to_string()),
            result: Some(result),
            status: Some(GenerationStatus::Completed),
            ..Self::default()
        }
    }
}

/// Persistence seam for generation records.
///
/// Implementations must apply each operation atomically per record; no
/// coordination across records is required.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Assign a fresh id and creation time; unset status defaults to pending.
    async fn create(&self, new: NewGeneration) -> Result<GenerationRecord, GenError>;

    async fn get(&self, id: i64) -> Result<GenerationRecord, GenError>;

    /// Merge `patch` into an existing record. Unknown ids yield
    /// [`GenError::NotFound`] and never create a record.
    async fn update(&self, id: i64, patch: GenerationPatch) -> Result<GenerationRecord, GenError>;

    /// Unordered snapshot of every record of `kind`.
    async fn list_by_type(&self, kind: GenerationKind) -> Result<Vec<GenerationRecord>, GenError>;

    /// Short backend label reported at startup and by the health endpoint.
    fn backend(&self) -> &'static str;
}

/// Current UTC time truncated to millisecond precision, the resolution both
/// stores persist.
pub(crate) fn now_millis() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(u32::from(now.millisecond()) * 1_000_000)
        .unwrap_or(now)
}

pub(crate) fn to_unix_millis(ts: OffsetDateTime) -> i64 {
    (ts.unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn from_unix_millis(ms: i64) -> Result<OffsetDateTime, GenError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .map_err(|err| GenError::Storage(err.to_string()))
}
