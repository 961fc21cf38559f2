//! Version 1 of the HTTP API.
//!
//! Handlers are thin: they turn request bodies into [`GenerationRequest`]s,
//! hand them to the [`Dispatcher`] and shape the outcome as JSON.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::ApiError;
use crate::dispatcher::{Dispatcher, GenerationRequest};
use crate::providers::{ImageTask, SpeechTask, TextTask, DEFAULT_IMAGE_SIZE, DEFAULT_TEMPERATURE, DEFAULT_VOICE};
use crate::records::{GenerationKind, GenerationRecord, GenerationStatus, RecordStore};
use crate::voices::{available_voices, VoiceInfo, VoiceSource};

/// Shared state injected into each handler.
#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<dyn RecordStore>,
    pub voices: Option<Arc<dyn VoiceSource>>,
    pub services: BTreeMap<String, bool>,
}

impl ApiState {
    pub fn new(dispatcher: Arc<Dispatcher>, services: BTreeMap<String, bool>) -> Self {
        Self {
            store: dispatcher.store(),
            voices: dispatcher.providers().voices.clone(),
            dispatcher,
            services,
        }
    }
}

pub(super) fn routes() -> Router<ApiState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/generate/text", post(generate_text))
        .route("/api/generate/image", post(generate_image))
        .route("/api/generate/speech", post(generate_speech))
        .route("/api/voices", get(voices))
        .route("/api/generations", get(list_generations))
        .route("/api/generations/{id}", get(get_generation))
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub prompt: String,
    pub model: Option<String>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ImageBody {
    #[serde(default)]
    pub prompt: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SpeechBody {
    #[serde(default)]
    pub text: String,
    pub voice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub id: i64,
    pub status: GenerationStatus,
    pub result: Option<Value>,
}

impl From<GenerationRecord> for GenerationResponse {
    fn from(record: GenerationRecord) -> Self {
        Self {
            id: record.id,
            status: record.status,
            result: record.result,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

async fn health(State(state): State<ApiState>) -> Json<Value> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(json!({
        "status": "ok",
        "timestamp": timestamp,
        "services": state.services,
        "storage": state.store.backend(),
    }))
}

async fn generate_text(
    State(state): State<ApiState>,
    payload: Result<Json<TextBody>, JsonRejection>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let body = json_body(payload)?;
    let request = GenerationRequest::Text(TextTask {
        prompt: body.prompt,
        model: body.model.filter(|m| !m.trim().is_empty()),
        temperature: body.temperature.unwrap_or(DEFAULT_TEMPERATURE),
    });
    let record = state.dispatcher.dispatch(request).await?;
    Ok(Json(record.into()))
}

async fn generate_image(
    State(state): State<ApiState>,
    payload: Result<Json<ImageBody>, JsonRejection>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let body = json_body(payload)?;
    let request = GenerationRequest::Image(ImageTask {
        prompt: body.prompt,
        width: body.width.unwrap_or(DEFAULT_IMAGE_SIZE),
        height: body.height.unwrap_or(DEFAULT_IMAGE_SIZE),
    });
    let record = state.dispatcher.dispatch(request).await?;
    Ok(Json(record.into()))
}

async fn generate_speech(
    State(state): State<ApiState>,
    payload: Result<Json<SpeechBody>, JsonRejection>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let body = json_body(payload)?;
    let request = GenerationRequest::Speech(SpeechTask {
        text: body.text,
        voice: body
            .voice
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
    });
    let record = state.dispatcher.dispatch(request).await?;
    Ok(Json(record.into()))
}

async fn voices(State(state): State<ApiState>) -> Result<Json<Vec<VoiceInfo>>, ApiError> {
    available_voices(state.voices.as_deref())
        .await
        .map(Json)
        .map_err(|err| {
            log::error!("[{}] voice listing failed: {err}", err.code());
            ApiError::internal("Failed to fetch voices")
        })
}

async fn list_generations(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<GenerationRecord>>, ApiError> {
    let kinds = match query.kind.as_deref() {
        Some(raw) => vec![raw.parse::<GenerationKind>()?],
        None => GenerationKind::ALL.to_vec(),
    };
    let mut records = Vec::new();
    for kind in kinds {
        records.extend(state.store.list_by_type(kind).await?);
    }
    Ok(Json(records))
}

async fn get_generation(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<GenerationRecord>, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::bad_request("Generation id must be an integer"))?;
    Ok(Json(state.store.get(id).await?))
}
