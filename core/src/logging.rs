//! Dispatch observability.
//!
//! The dispatcher reports every skip, fallback, completion and exhaustion to
//! a [`DispatchObserver`]. [`LogObserver`] forwards to the `log` facade and
//! [`EventLogObserver`] persists structured rows into the `event_log` table.

use std::sync::Arc;

use r2d2_sqlite::rusqlite::{params, Connection};
use serde_json::{json, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::DbPool;
use crate::errors::ProviderError;
use crate::records::{GenerationKind, GenerationRecord};

pub const DISPATCH_TARGET: &str = "genstudio::dispatch";
pub const DISPATCH_MODULE: &str = "ai.dispatch";

pub fn log_event(
    conn: &Connection,
    level: &str,
    code: Option<&str>,
    module: &str,
    message: &str,
    explain: Option<&str>,
    data: Option<Value>,
) -> rusqlite::Result<()> {
    let id = Uuid::new_v4().to_string();
    let ts = OffsetDateTime::now_utc().unix_timestamp();
    let data_str = data.map(|v| v.to_string());
    conn.execute(
        "INSERT INTO event_log (id, ts, level, code, module, message, explain, data) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![id, ts, level, code, module, message, explain, data_str],
    )?;
    Ok(())
}

/// Hooks invoked while a dispatch walks its provider chain.
pub trait DispatchObserver: Send + Sync {
    /// `provider` had no credentials and was not called.
    fn on_skipped(&self, _kind: GenerationKind, _record_id: i64, _provider: &'static str) {}

    /// `error` ended one attempt; the next provider (if any) is tried.
    fn on_fallback(&self, _kind: GenerationKind, _record_id: i64, _error: &ProviderError) {}

    fn on_completed(&self, _record: &GenerationRecord) {}

    /// No provider produced a result after `attempted` calls.
    fn on_exhausted(&self, _kind: GenerationKind, _record_id: i64, _attempted: usize) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl DispatchObserver for NoopObserver {}

pub struct LogObserver;

impl DispatchObserver for LogObserver {
    fn on_skipped(&self, kind: GenerationKind, record_id: i64, provider: &'static str) {
        log::debug!(
            target: DISPATCH_TARGET,
            "generation {record_id} ({kind}): skipping {provider}, no credentials"
        );
    }

    fn on_fallback(&self, kind: GenerationKind, record_id: i64, error: &ProviderError) {
        log::warn!(
            target: DISPATCH_TARGET,
            "generation {record_id} ({kind}): [{}] {error}; trying next provider",
            error.code()
        );
    }

    fn on_completed(&self, record: &GenerationRecord) {
        log::info!(
            target: DISPATCH_TARGET,
            "generation {} ({}) completed by {} using {}",
            record.id,
            record.kind,
            record.provider.as_deref().unwrap_or("-"),
            record.model.as_deref().unwrap_or("-")
        );
    }

    fn on_exhausted(&self, kind: GenerationKind, record_id: i64, attempted: usize) {
        log::error!(
            target: DISPATCH_TARGET,
            "generation {record_id} ({kind}) failed after {attempted} provider attempt(s)"
        );
    }
}

/// One pending `event_log` row.
#[derive(Debug, Clone)]
struct DispatchEvent {
    level: &'static str,
    code: &'static str,
    message: &'static str,
    explain: &'static str,
    data: Value,
}

/// Persists dispatch events into the SQLite `event_log` table.
///
/// Writes happen on the blocking pool and never delay the dispatch; a failed
/// write only produces a log line.
#[derive(Clone)]
pub struct EventLogObserver {
    pool: DbPool,
}

impl EventLogObserver {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn emit(&self, event: DispatchEvent) {
        let pool = self.pool.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || persist(&pool, &event));
            }
            Err(_) => persist(&pool, &event),
        }
    }
}

fn persist(pool: &DbPool, event: &DispatchEvent) {
    let outcome = pool
        .get()
        .map_err(|err| err.to_string())
        .and_then(|conn| {
            log_event(
                &conn,
                event.level,
                Some(event.code),
                DISPATCH_MODULE,
                event.message,
                Some(event.explain),
                Some(event.data.clone()),
            )
            .map_err(|err| err.to_string())
        });
    if let Err(err) = outcome {
        log::warn!(target: DISPATCH_TARGET, "failed to record {}: {err}", event.code);
    }
}

impl DispatchObserver for EventLogObserver {
    fn on_skipped(&self, kind: GenerationKind, record_id: i64, provider: &'static str) {
        self.emit(DispatchEvent {
            level: "info",
            code: "AI-0202",
            message: "Provider skipped",
            explain: "No credentials are configured for this provider",
            data: json!({"kind": kind, "generationId": record_id, "provider": provider}),
        });
    }

    fn on_fallback(&self, kind: GenerationKind, record_id: i64, error: &ProviderError) {
        self.emit(DispatchEvent {
            level: "warn",
            code: "AI-0201",
            message: "Provider invocation failed",
            explain: "Attempting fallback",
            data: json!({
                "kind": kind,
                "generationId": record_id,
                "provider": error.provider(),
                "errorCode": error.code(),
                "status": error.status(),
                "error": error.to_string(),
            }),
        });
    }

    fn on_completed(&self, record: &GenerationRecord) {
        self.emit(DispatchEvent {
            level: "info",
            code: "AI-0200",
            message: "Generation completed",
            explain: "Dispatcher resolved a provider",
            data: json!({
                "kind": record.kind,
                "generationId": record.id,
                "provider": record.provider,
                "model": record.model,
            }),
        });
    }

    fn on_exhausted(&self, kind: GenerationKind, record_id: i64, attempted: usize) {
        self.emit(DispatchEvent {
            level: "error",
            code: "AI-0203",
            message: "All providers failed",
            explain: "Every provider in the chain failed or is unconfigured",
            data: json!({"kind": kind, "generationId": record_id, "attempted": attempted}),
        });
    }
}

/// Fans every hook out to several observers in order.
#[derive(Default, Clone)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn DispatchObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl DispatchObserver for CompositeObserver {
    fn on_skipped(&self, kind: GenerationKind, record_id: i64, provider: &'static str) {
        for observer in &self.observers {
            observer.on_skipped(kind, record_id, provider);
        }
    }

    fn on_fallback(&self, kind: GenerationKind, record_id: i64, error: &ProviderError) {
        for observer in &self.observers {
            observer.on_fallback(kind, record_id, error);
        }
    }

    fn on_completed(&self, record: &GenerationRecord) {
        for observer in &self.observers {
            observer.on_completed(record);
        }
    }

    fn on_exhausted(&self, kind: GenerationKind, record_id: i64, attempted: usize) {
        for observer in &self.observers {
            observer.on_exhausted(kind, record_id, attempted);
        }
    }
}

use r2d2_sqlite::rusqlite;
