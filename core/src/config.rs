//! Process configuration resolved once at startup.
//!
//! Nothing downstream reads the environment: the server builds an
//! [`AppConfig`] and hands the pieces to the provider registry, the record
//! store and the router.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use log::warn;

use crate::providers::catalog::{ProviderSeed, PROVIDER_SEEDS};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 60;

/// Credential and endpoint for one upstream provider.
#[derive(Clone)]
pub struct ProviderSettings {
    pub id: &'static str,
    pub api_key: Option<String>,
    pub base_url: String,
}

impl ProviderSettings {
    fn from_seed(seed: &ProviderSeed, lookup: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            id: seed.id,
            api_key: non_empty(lookup(seed.credential_env)),
            base_url: non_empty(lookup(seed.base_url_env))
                .unwrap_or_else(|| seed.default_base_url.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Settings with no credential, used for providers absent from the catalogue.
    pub fn unconfigured(id: &'static str, base_url: &str) -> Self {
        Self {
            id,
            api_key: None,
            base_url: base_url.to_string(),
        }
    }
}

// Keys stay out of logs.
impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("id", &self.id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub providers: Vec<ProviderSettings>,
    /// SQLite file backing the record store; `None` selects the memory store.
    pub database_path: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub uploads_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub provider_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let providers = PROVIDER_SEEDS
            .iter()
            .map(|seed| ProviderSettings::from_seed(seed, &lookup))
            .collect();

        let port = match non_empty(lookup("GENSTUDIO_PORT")) {
            Some(raw) => raw.parse::<u16>().unwrap_or_else(|_| {
                warn!("Invalid GENSTUDIO_PORT='{raw}', falling back to {DEFAULT_PORT}");
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let provider_timeout_secs = match non_empty(lookup("GENSTUDIO_PROVIDER_TIMEOUT_SECS")) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    warn!(
                        "Invalid GENSTUDIO_PROVIDER_TIMEOUT_SECS='{raw}', falling back to {DEFAULT_PROVIDER_TIMEOUT_SECS}"
                    );
                    DEFAULT_PROVIDER_TIMEOUT_SECS
                }
            },
            None => DEFAULT_PROVIDER_TIMEOUT_SECS,
        };

        Self {
            providers,
            database_path: non_empty(lookup("DATABASE_URL")).map(|url| database_path(&url)),
            host: non_empty(lookup("GENSTUDIO_HOST")).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            uploads_dir: non_empty(lookup("GENSTUDIO_UPLOADS_DIR"))
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOADS_DIR)),
            static_dir: non_empty(lookup("GENSTUDIO_STATIC_DIR")).map(PathBuf::from),
            provider_timeout: Duration::from_secs(provider_timeout_secs),
        }
    }

    pub fn provider(&self, id: &'static str) -> ProviderSettings {
        self.providers
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .unwrap_or_else(|| ProviderSettings::unconfigured(id, ""))
    }

    /// Which providers have credentials, keyed by provider id.
    pub fn services(&self) -> BTreeMap<String, bool> {
        self.providers
            .iter()
            .map(|p| (p.id.to_string(), p.is_configured()))
            .collect()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts `sqlite://path`, `sqlite:path` or a bare filesystem path.
fn database_path(url: &str) -> PathBuf {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(path)
}
