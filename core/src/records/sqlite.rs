use async_trait::async_trait;
use r2d2_sqlite::rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use serde_json::Value;
use tokio::task::spawn_blocking;

use super::{
    from_unix_millis, now_millis, to_unix_millis, GenerationKind, GenerationPatch,
    GenerationRecord, NewGeneration, RecordStore,
};
use crate::db::DbPool;
use crate::errors::GenError;

const SELECT_COLUMNS: &str = "SELECT id, kind, prompt, model, provider, parameters_json, result_json, status, created_at, user_id FROM generations";

/// Record store backed by the SQLite `generations` table.
///
/// Rusqlite is synchronous, so every call hops onto the blocking pool.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: DbPool,
}

impl SqliteRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn with_conn<T, F>(&self, work: F) -> Result<T, GenError>
    where
        T: Send + 'static,
        F: FnOnce(&mut r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>) -> Result<T, GenError>
            + Send
            + 'static,
    {
        let pool = self.pool.clone();
        spawn_blocking(move || {
            let mut conn = pool.get()?;
            work(&mut conn)
        })
        .await
        .map_err(|err| GenError::Storage(err.to_string()))?
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create(&self, new: NewGeneration) -> Result<GenerationRecord, GenError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            // Validate before touching the table; the id is patched in after insert.
            let draft = new.into_record(0, now_millis())?;
            tx.execute(
                "INSERT INTO generations (kind, prompt, model, provider, parameters_json, result_json, status, created_at, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    draft.kind.as_str(),
                    draft.prompt,
                    draft.model,
                    draft.provider,
                    draft.parameters.to_string(),
                    draft.result.as_ref().map(Value::to_string),
                    draft.status.as_str(),
                    to_unix_millis(draft.created_at),
                    draft.user_id,
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(GenerationRecord { id, ..draft })
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<GenerationRecord, GenError> {
        self.with_conn(move |conn| fetch(conn, id)?.ok_or(GenError::NotFound(id)))
            .await
    }

    async fn update(&self, id: i64, patch: GenerationPatch) -> Result<GenerationRecord, GenError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut record = fetch(&tx, id)?.ok_or(GenError::NotFound(id))?;
            record.apply(patch)?;
            tx.execute(
                "UPDATE generations SET model = ?2, provider = ?3, parameters_json = ?4, result_json = ?5, status = ?6 WHERE id = ?1",
                params![
                    id,
                    record.model,
                    record.provider,
                    record.parameters.to_string(),
                    record.result.as_ref().map(Value::to_string),
                    record.status.as_str(),
                ],
            )?;
            tx.commit()?;
            Ok(record)
        })
        .await
    }

    async fn list_by_type(&self, kind: GenerationKind) -> Result<Vec<GenerationRecord>, GenError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE kind = ?1"))?;
            let rows = stmt.query_map([kind.as_str()], read_row)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(decode(row?)?);
            }
            Ok(records)
        })
        .await
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

/// Raw column values, decoded outside the rusqlite row callback so that
/// JSON and enum parse failures surface as store errors.
struct RawRow {
    id: i64,
    kind: String,
    prompt: String,
    model: Option<String>,
    provider: Option<String>,
    parameters_json: String,
    result_json: Option<String>,
    status: String,
    created_at: i64,
    user_id: Option<i64>,
}

fn read_row(row: &Row) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        prompt: row.get(2)?,
        model: row.get(3)?,
        provider: row.get(4)?,
        parameters_json: row.get(5)?,
        result_json: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
        user_id: row.get(9)?,
    })
}

fn decode(raw: RawRow) -> Result<GenerationRecord, GenError> {
    Ok(GenerationRecord {
        id: raw.id,
        kind: raw
            .kind
            .parse()
            .map_err(|_| GenError::Storage(format!("unknown kind '{}'", raw.kind)))?,
        prompt: raw.prompt,
        model: raw.model,
        provider: raw.provider,
        parameters: serde_json::from_str(&raw.parameters_json)?,
        result: raw
            .result_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        status: raw.status.parse()?,
        created_at: from_unix_millis(raw.created_at)?,
        user_id: raw.user_id,
    })
}

fn fetch(conn: &rusqlite::Connection, id: i64) -> Result<Option<GenerationRecord>, GenError> {
    let raw = conn
        .query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), [id], read_row)
        .optional()?;
    raw.map(decode).transpose()
}

use r2d2_sqlite::rusqlite;
