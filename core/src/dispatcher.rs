//! Generation dispatcher that walks a provider chain with graceful fallbacks.
//!
//! A dispatch creates the record, marks it processing, tries each configured
//! provider of the request's kind in catalogue order and stops at the first
//! success. Provider failures never reach the caller; they are reported to the
//! [`DispatchObserver`] and the next provider is tried.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::errors::{GenError, ProviderError};
use crate::logging::DispatchObserver;
use crate::media::MediaStore;
use crate::providers::{
    GenerationTask, ImageTask, ProviderChain, ProviderRegistry, SpeechTask, TextTask,
    DEFAULT_IMAGE_SIZE, DEFAULT_TEMPERATURE, DEFAULT_VOICE,
};
use crate::records::{
    GenerationKind, GenerationPatch, GenerationRecord, GenerationStatus, NewGeneration, RecordStore,
};

/// A validated-on-dispatch generation request.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationRequest {
    Text(TextTask),
    Image(ImageTask),
    Speech(SpeechTask),
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self::Text(TextTask {
            prompt: prompt.into(),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    pub fn image(prompt: impl Into<String>) -> Self {
        Self::Image(ImageTask {
            prompt: prompt.into(),
            width: DEFAULT_IMAGE_SIZE,
            height: DEFAULT_IMAGE_SIZE,
        })
    }

    pub fn speech(text: impl Into<String>) -> Self {
        Self::Speech(SpeechTask {
            text: text.into(),
            voice: DEFAULT_VOICE.to_string(),
        })
    }

    /// Build a request from a type tag, the prompt and loosely typed options.
    ///
    /// Missing or mistyped options fall back to their defaults.
    pub fn from_parts(kind: &str, prompt: &str, options: &Value) -> Result<Self, GenError> {
        let kind: GenerationKind = kind.parse()?;
        let request = match kind {
            GenerationKind::Text => Self::Text(TextTask {
                prompt: prompt.to_string(),
                model: options
                    .get("model")
                    .and_then(Value::as_str)
                    .filter(|m| !m.trim().is_empty())
                    .map(str::to_string),
                temperature: options
                    .get("temperature")
                    .and_then(Value::as_f64)
                    .unwrap_or(DEFAULT_TEMPERATURE),
            }),
            GenerationKind::Image => Self::Image(ImageTask {
                prompt: prompt.to_string(),
                width: dimension(options, "width"),
                height: dimension(options, "height"),
            }),
            GenerationKind::Speech => Self::Speech(SpeechTask {
                text: prompt.to_string(),
                voice: options
                    .get("voice")
                    .and_then(Value::as_str)
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or(DEFAULT_VOICE)
                    .to_string(),
            }),
        };
        Ok(request)
    }

    pub fn kind(&self) -> GenerationKind {
        match self {
            Self::Text(_) => TextTask::KIND,
            Self::Image(_) => ImageTask::KIND,
            Self::Speech(_) => SpeechTask::KIND,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            Self::Text(task) => &task.prompt,
            Self::Image(task) => &task.prompt,
            Self::Speech(task) => &task.text,
        }
    }

    pub fn validate(&self) -> Result<(), GenError> {
        if !self.prompt().trim().is_empty() {
            return Ok(());
        }
        let message = match self {
            Self::Speech(_) => "Text is required",
            _ => "Prompt is required",
        };
        Err(GenError::Validation(message.to_string()))
    }

    fn parameters(&self) -> Value {
        match self {
            Self::Text(task) => json!({"temperature": task.temperature, "model": task.model}),
            Self::Image(task) => json!({"width": task.width, "height": task.height}),
            Self::Speech(task) => json!({"voice": task.voice}),
        }
    }

    fn new_generation(&self) -> NewGeneration {
        let mut new = NewGeneration::new(self.kind(), self.prompt(), self.parameters());
        if let Self::Text(task) = self {
            new.model = task.model.clone();
        }
        new
    }
}

fn dimension(options: &Value, key: &str) -> u32 {
    options
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(DEFAULT_IMAGE_SIZE)
}

/// First successful provider of a chain.
struct Winner<O> {
    provider: &'static str,
    model: String,
    output: O,
}

pub struct Dispatcher {
    store: Arc<dyn RecordStore>,
    providers: ProviderRegistry,
    media: MediaStore,
    observer: Arc<dyn DispatchObserver>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn RecordStore>,
        providers: ProviderRegistry,
        media: MediaStore,
        observer: Arc<dyn DispatchObserver>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            providers,
            media,
            observer,
            timeout,
        }
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Run one generation request to completion.
    ///
    /// Returns the completed record, or an error after marking the record
    /// failed. Invalid requests create no record.
    pub async fn dispatch(&self, request: GenerationRequest) -> Result<GenerationRecord, GenError> {
        request.validate()?;
        let kind = request.kind();
        let record = self.store.create(request.new_generation()).await?;
        let id = record.id;
        if let Err(err) = self
            .store
            .update(id, GenerationPatch::status(GenerationStatus::Processing))
            .await
        {
            log::error!("generation {id}: {err}");
            self.mark_failed(id).await;
            return Err(err);
        }

        let outcome = match &request {
            GenerationRequest::Text(task) => self
                .attempt(&self.providers.text, task, id)
                .await
                .map(|w| w.with_output(json!({"text": w.output}))),
            GenerationRequest::Image(task) => self
                .attempt(&self.providers.image, task, id)
                .await
                .map(|w| w.with_output(json!({"url": w.output.url}))),
            GenerationRequest::Speech(task) => {
                match self.attempt(&self.providers.speech, task, id).await {
                    Ok(winner) => match self.media.save_speech(id, &winner.output).await {
                        Ok(url) => Ok(winner.with_output(json!({"url": url}))),
                        Err(err) => {
                            log::error!("generation {id}: {err}");
                            self.mark_failed(id).await;
                            return Err(err);
                        }
                    },
                    Err(attempted) => Err(attempted),
                }
            }
        };

        match outcome {
            Ok(winner) => {
                let patch = GenerationPatch::completed(winner.provider, winner.model, winner.output);
                match self.store.update(id, patch).await {
                    Ok(record) => {
                        self.observer.on_completed(&record);
                        Ok(record)
                    }
                    Err(err) => {
                        log::error!("generation {id}: {err}");
                        self.mark_failed(id).await;
                        Err(err)
                    }
                }
            }
            Err(attempted) => {
                self.mark_failed(id).await;
                self.observer.on_exhausted(kind, id, attempted);
                Err(GenError::AllProvidersExhausted { kind, attempted })
            }
        }
    }

    /// Walk `chain` in order. `Err` carries the number of providers that
    /// were actually called.
    async fn attempt<T: GenerationTask>(
        &self,
        chain: &ProviderChain<T>,
        task: &T,
        record_id: i64,
    ) -> Result<Winner<T::Output>, usize> {
        let mut attempted = 0;
        for provider in chain {
            let id = provider.id();
            if !provider.is_configured() {
                self.observer.on_skipped(T::KIND, record_id, id);
                continue;
            }
            attempted += 1;
            let result = match tokio::time::timeout(self.timeout, provider.generate(task)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout {
                    provider: id,
                    secs: self.timeout.as_secs(),
                }),
            };
            match result {
                Ok(output) => {
                    return Ok(Winner {
                        provider: id,
                        model: provider.model(task),
                        output,
                    })
                }
                Err(err) => self.observer.on_fallback(T::KIND, record_id, &err),
            }
        }
        Err(attempted)
    }

    async fn mark_failed(&self, id: i64) {
        if let Err(err) = self
            .store
            .update(id, GenerationPatch::status(GenerationStatus::Failed))
            .await
        {
            log::warn!("could not mark generation {id} failed: {err}");
        }
    }
}

impl<O> Winner<O> {
    fn with_output(&self, output: Value) -> Winner<Value> {
        Winner {
            provider: self.provider,
            model: self.model.clone(),
            output,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::providers::{ImageOutput, Provider};
    use crate::records::MemoryRecordStore;

    /// Scripted provider counting its calls.
    struct Stub {
        id: &'static str,
        configured: bool,
        succeed: bool,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl Stub {
        fn new(id: &'static str, configured: bool, succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                id,
                configured,
                succeed,
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(id: &'static str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                id,
                configured: true,
                succeed: true,
                delay: Some(delay),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn run<O>(&self, output: O) -> Result<O, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.succeed {
                Ok(output)
            } else {
                Err(ProviderError::Upstream {
                    provider: self.id,
                    status: 503,
                    message: "overloaded".into(),
                })
            }
        }
    }

    #[async_trait]
    impl Provider<TextTask> for Stub {
        fn id(&self) -> &'static str {
            self.id
        }
        fn is_configured(&self) -> bool {
            self.configured
        }
        fn model(&self, _task: &TextTask) -> String {
            format!("{}-model", self.id)
        }
        async fn generate(&self, task: &TextTask) -> Result<String, ProviderError> {
            self.run(format!("{} says {}", self.id, task.prompt)).await
        }
    }

    #[async_trait]
    impl Provider<ImageTask> for Stub {
        fn id(&self) -> &'static str {
            self.id
        }
        fn is_configured(&self) -> bool {
            self.configured
        }
        fn model(&self, _task: &ImageTask) -> String {
            format!("{}-image", self.id)
        }
        async fn generate(&self, _task: &ImageTask) -> Result<ImageOutput, ProviderError> {
            self.run(ImageOutput {
                url: format!("https://img.test/{}.png", self.id),
            })
            .await
        }
    }

    #[async_trait]
    impl Provider<SpeechTask> for Stub {
        fn id(&self) -> &'static str {
            self.id
        }
        fn is_configured(&self) -> bool {
            self.configured
        }
        fn model(&self, _task: &SpeechTask) -> String {
            format!("{}-tts", self.id)
        }
        async fn generate(&self, _task: &SpeechTask) -> Result<Vec<u8>, ProviderError> {
            self.run(b"ID3-fake-audio".to_vec()).await
        }
    }

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl DispatchObserver for Events {
        fn on_skipped(&self, _kind: GenerationKind, _id: i64, provider: &'static str) {
            self.0.lock().unwrap().push(format!("skipped:{provider}"));
        }
        fn on_fallback(&self, _kind: GenerationKind, _id: i64, error: &ProviderError) {
            self.0.lock().unwrap().push(format!("fallback:{}", error.provider()));
        }
        fn on_completed(&self, record: &GenerationRecord) {
            let provider = record.provider.clone().unwrap_or_default();
            self.0.lock().unwrap().push(format!("completed:{provider}"));
        }
        fn on_exhausted(&self, _kind: GenerationKind, _id: i64, attempted: usize) {
            self.0.lock().unwrap().push(format!("exhausted:{attempted}"));
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        store: Arc<MemoryRecordStore>,
        events: Arc<Events>,
        uploads: tempfile::TempDir,
    }

    fn harness(providers: ProviderRegistry) -> Harness {
        harness_with(providers, Duration::from_secs(5))
    }

    fn harness_with(providers: ProviderRegistry, timeout: Duration) -> Harness {
        let uploads = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryRecordStore::new());
        let events = Arc::new(Events::default());
        let dispatcher = Dispatcher::new(
            store.clone(),
            providers,
            MediaStore::new(uploads.path()),
            events.clone(),
            timeout,
        );
        Harness {
            dispatcher,
            store,
            events,
            uploads,
        }
    }

    fn events(h: &Harness) -> Vec<String> {
        h.events.0.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn first_configured_provider_wins() {
        let xai = Stub::new("xai", true, true);
        let openai = Stub::new("openai", true, true);
        let h = harness(ProviderRegistry {
            text: vec![xai.clone(), openai.clone()],
            ..ProviderRegistry::default()
        });

        let record = h.dispatcher.dispatch(GenerationRequest::text("hi")).await.unwrap();
        assert_eq!(record.status, GenerationStatus::Completed);
        assert_eq!(record.result, Some(json!({"text": "xai says hi"})));
        assert_eq!(record.provider.as_deref(), Some("xai"));
        assert_eq!(record.model.as_deref(), Some("xai-model"));
        assert_eq!((xai.calls(), openai.calls()), (1, 0));
    }

    #[tokio::test]
    async fn failure_falls_back_to_next_provider() {
        let stability = Stub::new("stability", true, false);
        let openai = Stub::new("openai", true, true);
        let h = harness(ProviderRegistry {
            image: vec![stability.clone(), openai.clone()],
            ..ProviderRegistry::default()
        });

        let record = h
            .dispatcher
            .dispatch(GenerationRequest::image("a lighthouse"))
            .await
            .unwrap();
        assert_eq!(record.result, Some(json!({"url": "https://img.test/openai.png"})));
        assert_eq!((stability.calls(), openai.calls()), (1, 1));
        assert_eq!(events(&h), vec!["fallback:stability", "completed:openai"]);
        assert_eq!(h.store.get(record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn unconfigured_providers_are_never_called() {
        let xai = Stub::new("xai", false, true);
        let openai = Stub::new("openai", false, true);
        let h = harness(ProviderRegistry {
            text: vec![xai.clone(), openai.clone()],
            ..ProviderRegistry::default()
        });

        let err = h.dispatcher.dispatch(GenerationRequest::text("hi")).await.unwrap_err();
        assert!(matches!(
            err,
            GenError::AllProvidersExhausted {
                kind: GenerationKind::Text,
                attempted: 0
            }
        ));
        assert_eq!((xai.calls(), openai.calls()), (0, 0));
        let records = h.store.list_by_type(GenerationKind::Text).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, GenerationStatus::Failed);
        assert!(records[0].result.is_none());
        assert_eq!(events(&h), vec!["skipped:xai", "skipped:openai", "exhausted:0"]);
    }

    #[tokio::test]
    async fn every_failure_marks_record_failed() {
        let h = harness(ProviderRegistry {
            speech: vec![Stub::new("elevenlabs", true, false), Stub::new("openai", true, false)],
            ..ProviderRegistry::default()
        });
        let err = h
            .dispatcher
            .dispatch(GenerationRequest::speech("hello"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "All speech generation services failed");
        let records = h.store.list_by_type(GenerationKind::Speech).await.unwrap();
        assert_eq!(records[0].status, GenerationStatus::Failed);
    }

    #[tokio::test]
    async fn blank_prompt_creates_no_record() {
        let openai = Stub::new("openai", true, true);
        let h = harness(ProviderRegistry {
            text: vec![openai.clone()],
            ..ProviderRegistry::default()
        });
        let err = h.dispatcher.dispatch(GenerationRequest::text("   ")).await.unwrap_err();
        assert_eq!(err.to_string(), "Prompt is required");
        let err = h.dispatcher.dispatch(GenerationRequest::speech("")).await.unwrap_err();
        assert_eq!(err.to_string(), "Text is required");
        let image = GenerationRequest::from_parts("image", "", &json!({})).unwrap();
        let err = h.dispatcher.dispatch(image).await.unwrap_err();
        assert!(matches!(err, GenError::Validation(_)));
        assert_eq!(err.to_string(), "Prompt is required");
        assert_eq!(openai.calls(), 0);
        for kind in GenerationKind::ALL {
            assert!(h.store.list_by_type(kind).await.unwrap().is_empty());
        }
    }

    /// Memory store whose updates into `fail_on` report a storage failure.
    struct LockedStore {
        inner: MemoryRecordStore,
        fail_on: GenerationStatus,
    }

    #[async_trait]
    impl RecordStore for LockedStore {
        async fn create(&self, new: NewGeneration) -> Result<GenerationRecord, GenError> {
            self.inner.create(new).await
        }

        async fn get(&self, id: i64) -> Result<GenerationRecord, GenError> {
            self.inner.get(id).await
        }

        async fn update(&self, id: i64, patch: GenerationPatch) -> Result<GenerationRecord, GenError> {
            if patch.status == Some(self.fail_on) {
                return Err(GenError::Storage("database is locked".into()));
            }
            self.inner.update(id, patch).await
        }

        async fn list_by_type(&self, kind: GenerationKind) -> Result<Vec<GenerationRecord>, GenError> {
            self.inner.list_by_type(kind).await
        }

        fn backend(&self) -> &'static str {
            "locked"
        }
    }

    async fn dispatch_with_locked(fail_on: GenerationStatus) -> (GenError, GenerationRecord, Vec<String>) {
        let uploads = tempfile::tempdir().unwrap();
        let store = Arc::new(LockedStore {
            inner: MemoryRecordStore::new(),
            fail_on,
        });
        let events = Arc::new(Events::default());
        let dispatcher = Dispatcher::new(
            store.clone(),
            ProviderRegistry {
                text: vec![Stub::new("openai", true, true)],
                ..ProviderRegistry::default()
            },
            MediaStore::new(uploads.path()),
            events.clone(),
            Duration::from_secs(5),
        );
        let err = dispatcher
            .dispatch(GenerationRequest::text("hi"))
            .await
            .unwrap_err();
        let records = store.list_by_type(GenerationKind::Text).await.unwrap();
        assert_eq!(records.len(), 1);
        let seen = events.0.lock().unwrap().clone();
        (err, records[0].clone(), seen)
    }

    #[tokio::test]
    async fn failed_completion_write_fails_the_record() {
        let (err, record, seen) = dispatch_with_locked(GenerationStatus::Completed).await;
        assert_eq!(err.to_string(), "Storage failure: database is locked");
        assert_eq!(record.status, GenerationStatus::Failed);
        assert!(record.result.is_none());
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn failed_processing_write_fails_the_record() {
        let (err, record, seen) = dispatch_with_locked(GenerationStatus::Processing).await;
        assert!(matches!(err, GenError::Storage(_)));
        assert_eq!(record.status, GenerationStatus::Failed);
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn temperature_is_stored_exactly() {
        let h = harness(ProviderRegistry {
            text: vec![Stub::new("openai", true, true)],
            ..ProviderRegistry::default()
        });
        let request =
            GenerationRequest::from_parts("text", "hi", &json!({"temperature": 0.7})).unwrap();
        let record = h.dispatcher.dispatch(request).await.unwrap();
        assert_eq!(record.parameters["temperature"], json!(0.7));

        let record = h.dispatcher.dispatch(GenerationRequest::text("hi")).await.unwrap();
        assert_eq!(record.parameters["temperature"], json!(0.8));
    }

    #[tokio::test]
    async fn speech_audio_is_written_to_uploads() {
        let h = harness(ProviderRegistry {
            speech: vec![Stub::new("elevenlabs", false, true), Stub::new("openai", true, true)],
            ..ProviderRegistry::default()
        });
        let record = h
            .dispatcher
            .dispatch(GenerationRequest::speech("hello"))
            .await
            .unwrap();
        let file = format!("speech_{}.mp3", record.id);
        assert_eq!(
            record.result,
            Some(json!({"url": format!("/uploads/{file}")}))
        );
        assert_eq!(record.parameters, json!({"voice": "alloy"}));
        let audio = std::fs::read(h.uploads.path().join(file)).unwrap();
        assert_eq!(audio, b"ID3-fake-audio");
    }

    #[tokio::test]
    async fn media_failure_fails_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("uploads");
        std::fs::write(&blocker, b"file, not dir").unwrap();
        let store = Arc::new(MemoryRecordStore::new());
        let dispatcher = Dispatcher::new(
            store.clone(),
            ProviderRegistry {
                speech: vec![Stub::new("openai", true, true)],
                ..ProviderRegistry::default()
            },
            MediaStore::new(&blocker),
            Arc::new(crate::logging::NoopObserver),
            Duration::from_secs(5),
        );
        let err = dispatcher
            .dispatch(GenerationRequest::speech("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::Media(_)));
        let records = store.list_by_type(GenerationKind::Speech).await.unwrap();
        assert_eq!(records[0].status, GenerationStatus::Failed);
    }

    #[tokio::test]
    async fn slow_provider_times_out_and_falls_back() {
        let slow = Stub::slow("xai", Duration::from_secs(30));
        let openai = Stub::new("openai", true, true);
        let h = harness_with(
            ProviderRegistry {
                text: vec![slow.clone(), openai.clone()],
                ..ProviderRegistry::default()
            },
            Duration::from_millis(50),
        );
        let record = h.dispatcher.dispatch(GenerationRequest::text("hi")).await.unwrap();
        assert_eq!(record.provider.as_deref(), Some("openai"));
        assert_eq!(slow.calls(), 1);
        assert_eq!(events(&h), vec!["fallback:xai", "completed:openai"]);
    }

    #[tokio::test]
    async fn each_dispatch_creates_exactly_one_record() {
        let h = harness(ProviderRegistry {
            text: vec![Stub::new("xai", true, false), Stub::new("openai", true, true)],
            ..ProviderRegistry::default()
        });
        let first = h.dispatcher.dispatch(GenerationRequest::text("one")).await.unwrap();
        let second = h.dispatcher.dispatch(GenerationRequest::text("two")).await.unwrap();
        assert!(second.id > first.id);
        assert_eq!(h.store.list_by_type(GenerationKind::Text).await.unwrap().len(), 2);
    }

    #[test]
    fn from_parts_reads_options_with_defaults() {
        let request = GenerationRequest::from_parts(
            "TEXT",
            "hi",
            &json!({"model": "grok-beta", "temperature": 0.2}),
        )
        .unwrap();
        assert_eq!(
            request,
            GenerationRequest::Text(TextTask {
                prompt: "hi".into(),
                model: Some("grok-beta".into()),
                temperature: 0.2,
            })
        );

        let image = GenerationRequest::from_parts("image", "sky", &json!({"width": 1792})).unwrap();
        assert_eq!(
            image,
            GenerationRequest::Image(ImageTask {
                prompt: "sky".into(),
                width: 1792,
                height: 1024,
            })
        );

        let speech = GenerationRequest::from_parts("speech", "hello", &Value::Null).unwrap();
        assert_eq!(speech, GenerationRequest::speech("hello"));
    }

    #[test]
    fn from_parts_rejects_unknown_type() {
        let err = GenerationRequest::from_parts("video", "hi", &json!({})).unwrap_err();
        assert_eq!(err.code(), "GEN-1001");
    }

    #[tokio::test]
    async fn requested_model_is_seeded_then_replaced() {
        let h = harness(ProviderRegistry {
            text: vec![Stub::new("openai", true, true)],
            ..ProviderRegistry::default()
        });
        let request =
            GenerationRequest::from_parts("text", "hi", &json!({"model": "custom"})).unwrap();
        let record = h.dispatcher.dispatch(request).await.unwrap();
        assert_eq!(record.model.as_deref(), Some("openai-model"));
        assert_eq!(record.parameters["model"], "custom");
    }
}
