//! Central error catalogue.
//!
//! Every variant carries a stable code and a human friendly explanation so
//! that log lines, event rows and HTTP bodies can reference the same entry.

use thiserror::Error;

use crate::records::{GenerationKind, GenerationStatus};

/// Failure of a single upstream provider call.
///
/// The dispatcher swallows these and moves on to the next provider in the
/// chain; they only ever reach logs and the event table.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider}: credentials are not configured")]
    MissingCredentials { provider: &'static str },
    #[error("{provider}: request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider}: upstream returned {status}: {message}")]
    Upstream {
        provider: &'static str,
        status: u16,
        message: String,
    },
    #[error("{provider}: upstream returned no usable result")]
    EmptyResult { provider: &'static str },
    #[error("{provider}: no response within {secs}s")]
    Timeout { provider: &'static str, secs: u64 },
    #[error("{provider}: invalid endpoint {url}")]
    InvalidEndpoint { provider: &'static str, url: String },
}

impl ProviderError {
    pub fn provider(&self) -> &'static str {
        match self {
            Self::MissingCredentials { provider }
            | Self::Transport { provider, .. }
            | Self::Upstream { provider, .. }
            | Self::EmptyResult { provider }
            | Self::Timeout { provider, .. }
            | Self::InvalidEndpoint { provider, .. } => *provider,
        }
    }

    /// Upstream HTTP status, when the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredentials { .. } => "PRV-1001",
            Self::Transport { .. } => "PRV-1002",
            Self::Upstream { .. } => "PRV-1003",
            Self::EmptyResult { .. } => "PRV-1004",
            Self::Timeout { .. } => "PRV-1005",
            Self::InvalidEndpoint { .. } => "PRV-1006",
        }
    }
}

#[derive(Debug, Error)]
pub enum GenError {
    #[error("{0}")]
    Validation(String),
    #[error("All {kind} generation services failed")]
    AllProvidersExhausted { kind: GenerationKind, attempted: usize },
    #[error("Generation {0} not found")]
    NotFound(i64),
    #[error("Generation {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: i64,
        from: GenerationStatus,
        to: GenerationStatus,
    },
    #[error("Generation {id} would be {status} {}", result_phrase(.has_result))]
    IncoherentRecord {
        id: i64,
        status: GenerationStatus,
        has_result: bool,
    },
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error("Media storage failure: {0}")]
    Media(#[from] std::io::Error),
}

fn result_phrase(has_result: &bool) -> &'static str {
    if *has_result {
        "with a result"
    } else {
        "without a result"
    }
}

impl GenError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "GEN-1001",
            Self::AllProvidersExhausted { .. } => "GEN-2001",
            Self::NotFound(_) => "GEN-3001",
            Self::InvalidTransition { .. } => "GEN-3002",
            Self::IncoherentRecord { .. } => "GEN-3003",
            Self::Storage(_) => "GEN-4001",
            Self::Media(_) => "GEN-4002",
        }
    }

    pub fn explain(&self) -> &'static str {
        match self {
            Self::Validation(_) => "The request is missing a required field or names an unknown generation type.",
            Self::AllProvidersExhausted { .. } => {
                "Every configured provider for this generation type failed or none is configured."
            }
            Self::NotFound(_) => "No generation exists for the requested ID.",
            Self::InvalidTransition { .. } => "Generation status only moves forward and terminal records are frozen.",
            Self::IncoherentRecord { .. } => "A generation carries a result exactly when it is completed.",
            Self::Storage(_) => "The generation record store could not complete the operation.",
            Self::Media(_) => "Generated media could not be written to the uploads directory.",
        }
    }
}

impl From<rusqlite::Error> for GenError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<r2d2::Error> for GenError {
    fn from(err: r2d2::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for GenError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
