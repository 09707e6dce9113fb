//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

use styleset_agent::backend::{
    ImageProvider, ProviderError, ProviderRequest, ProviderResponse, ResponsePart,
};
use styleset_agent::client::Unthrottled;
use styleset_agent::config::Settings;
use styleset_agent::models::{
    CronJob, ModelVariation, Preset, Run, RunStatus, Slide, SlideSet, Subject, Template,
};
use styleset_agent::storage::{paths, LocalStorage, ObjectStorage};
use styleset_agent::store::{MemoryStore, RunChange, Store};
use styleset_agent::{AppError, AppState, Result as AppResult};

/// Smallest byte string recognized as a PNG
pub const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4];

pub fn image_response() -> ProviderResponse {
    ProviderResponse {
        parts: vec![ResponsePart::Image {
            mime_type: "image/png".to_string(),
            data: PNG.to_vec(),
        }],
        finish_reason: Some("STOP".to_string()),
    }
}

pub fn text_only_response() -> ProviderResponse {
    ProviderResponse {
        parts: vec![ResponsePart::Text("I cannot do that".to_string())],
        finish_reason: Some("STOP".to_string()),
    }
}

/// Scripted provider: answers from the script first, then the fallback
pub struct FakeProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    fallback: Result<ProviderResponse, ProviderError>,
    failing_keys: HashSet<String>,
    calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    pub keys: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn succeeding() -> Self {
        Self::with_fallback(Ok(image_response()))
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::with_fallback(Err(error))
    }

    fn with_fallback(fallback: Result<ProviderResponse, ProviderError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            failing_keys: HashSet::new(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, answer: Result<ProviderResponse, ProviderError>) -> Self {
        self.script.lock().push_back(answer);
        self
    }

    /// Calls made with `key` always fail with a non-retryable error
    pub fn rejecting_key(mut self, key: &str) -> Self {
        self.failing_keys.insert(key.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-image-model"
    }

    async fn generate(
        &self,
        api_key: &str,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(request.prompt.clone());
        self.keys.lock().push(api_key.to_string());

        if self.failing_keys.contains(api_key) {
            return Err(ProviderError::Other("HTTP 403: key disabled".to_string()));
        }

        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Settings with every delay at zero and one retry at each level
pub fn test_settings(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.storage.base_path = dir.path().to_string_lossy().to_string();
    settings.storage.url_prefix = "http://assets.test".to_string();
    settings.provider.api_keys = vec!["test-key-0001".to_string()];
    settings.throttle.min_interval_ms = 0;
    settings.throttle.rate_limit_retries = 1;
    settings.throttle.rate_limit_base_ms = 0;
    settings.throttle.rate_limit_max_ms = 0;
    settings.agent.slide_retries = 1;
    settings.agent.retry_base_ms = 0;
    settings.agent.slide_delay_ms = 0;
    settings.agent.set_cooldown_ms = 0;
    settings
}

pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<MemoryStore>,
    pub storage: Arc<LocalStorage>,
    pub provider: Arc<FakeProvider>,
    pub state: AppState,
}

impl Harness {
    pub fn new(provider: FakeProvider) -> Self {
        Self::with_settings(provider, |_| {})
    }

    pub fn with_settings(provider: FakeProvider, tweak: impl FnOnce(&mut Settings)) -> Self {
        Self::build(provider, tweak, |store| store as Arc<dyn Store>)
    }

    /// Harness whose services see the store through an `ObservedStore`
    pub fn observed(provider: FakeProvider) -> (Self, Arc<ObservedStore>) {
        let mut observed = None;
        let harness = Self::build(provider, |_| {}, |store| {
            let wrapper = Arc::new(ObservedStore::new(store));
            observed = Some(wrapper.clone());
            wrapper as Arc<dyn Store>
        });
        (harness, observed.expect("observed store"))
    }

    fn build(
        provider: FakeProvider,
        tweak: impl FnOnce(&mut Settings),
        wrap: impl FnOnce(Arc<MemoryStore>) -> Arc<dyn Store>,
    ) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut settings = test_settings(&dir);
        tweak(&mut settings);

        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(LocalStorage::new(dir.path(), "http://assets.test"));
        let provider = Arc::new(provider);
        let state = AppState::new(
            settings,
            wrap(store.clone()),
            storage.clone(),
            provider.clone(),
            Arc::new(Unthrottled),
        );

        Self {
            dir,
            store,
            storage,
            provider,
            state,
        }
    }

    /// Subject with one uploaded reference photo
    pub async fn seed_subject(&self, name: &str) -> Subject {
        let mut subject = Subject::new(name, Vec::new());
        let reference = paths::subject_reference(subject.id, "reference.png");
        self.storage
            .upload(&reference, PNG, "image/png")
            .await
            .expect("upload reference");
        subject.reference_image_paths.push(reference);
        subject
            .locked_attributes
            .insert("wardrobe".to_string(), "red dress".to_string());
        self.store.insert_subject(subject.clone()).await.expect("insert subject");
        subject
    }

    pub async fn seed_presets(&self, count: usize) -> Vec<Preset> {
        let mut presets = Vec::with_capacity(count);
        for i in 0..count {
            let preset = Preset::new(format!("Style {}", i), format!("hairstyle number {}", i));
            self.store.insert_preset(preset.clone()).await.expect("insert preset");
            presets.push(preset);
        }
        presets
    }
}

/// Store wrapper that records what the services write and injects faults
pub struct ObservedStore {
    inner: Arc<MemoryStore>,
    /// Ids of every set inserted, in order
    pub sets: Mutex<Vec<Uuid>>,
    /// Slides of the set as they were just before the first slide update
    pub before_first_slide_update: Mutex<Option<Vec<Slide>>>,
    /// Next `insert_set` fails
    pub fail_next_set_insert: AtomicBool,
    /// Next `modify_run` first cancels the run, as if a cancel landed just before it
    pub cancel_before_next_modify: AtomicBool,
}

impl ObservedStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            sets: Mutex::new(Vec::new()),
            before_first_slide_update: Mutex::new(None),
            fail_next_set_insert: AtomicBool::new(false),
            cancel_before_next_modify: AtomicBool::new(false),
        }
    }

    pub fn set_ids(&self) -> Vec<Uuid> {
        self.sets.lock().clone()
    }
}

#[async_trait]
impl Store for ObservedStore {
    async fn insert_subject(&self, subject: Subject) -> AppResult<()> {
        self.inner.insert_subject(subject).await
    }

    async fn get_subject(&self, id: Uuid) -> AppResult<Option<Subject>> {
        self.inner.get_subject(id).await
    }

    async fn first_subject(&self) -> AppResult<Option<Subject>> {
        self.inner.first_subject().await
    }

    async fn insert_template(&self, template: Template) -> AppResult<()> {
        self.inner.insert_template(template).await
    }

    async fn get_template(&self, id: Uuid) -> AppResult<Option<Template>> {
        self.inner.get_template(id).await
    }

    async fn first_template(&self) -> AppResult<Option<Template>> {
        self.inner.first_template().await
    }

    async fn insert_preset(&self, preset: Preset) -> AppResult<()> {
        self.inner.insert_preset(preset).await
    }

    async fn get_preset(&self, id: Uuid) -> AppResult<Option<Preset>> {
        self.inner.get_preset(id).await
    }

    async fn list_presets(&self) -> AppResult<Vec<Preset>> {
        self.inner.list_presets().await
    }

    async fn insert_model_variation(&self, variation: ModelVariation) -> AppResult<()> {
        self.inner.insert_model_variation(variation).await
    }

    async fn list_enabled_model_variations(&self) -> AppResult<Vec<ModelVariation>> {
        self.inner.list_enabled_model_variations().await
    }

    async fn insert_run(&self, run: Run) -> AppResult<()> {
        self.inner.insert_run(run).await
    }

    async fn get_run(&self, id: Uuid) -> AppResult<Option<Run>> {
        self.inner.get_run(id).await
    }

    async fn modify_run(&self, id: Uuid, change: RunChange) -> AppResult<Run> {
        if self.cancel_before_next_modify.swap(false, Ordering::SeqCst) {
            self.inner
                .modify_run(
                    id,
                    Box::new(|run: &mut Run| -> AppResult<()> {
                        run.status = RunStatus::Cancelled;
                        run.completed_at = Some(Utc::now());
                        Ok(())
                    }),
                )
                .await?;
        }
        self.inner.modify_run(id, change).await
    }

    async fn insert_set(&self, set: SlideSet) -> AppResult<()> {
        if self.fail_next_set_insert.swap(false, Ordering::SeqCst) {
            return Err(AppError::Internal("store unavailable".to_string()));
        }
        self.sets.lock().push(set.id);
        self.inner.insert_set(set).await
    }

    async fn get_set(&self, id: Uuid) -> AppResult<Option<SlideSet>> {
        self.inner.get_set(id).await
    }

    async fn update_set(&self, set: &SlideSet) -> AppResult<()> {
        self.inner.update_set(set).await
    }

    async fn insert_slide(&self, slide: Slide) -> AppResult<()> {
        self.inner.insert_slide(slide).await
    }

    async fn get_slide(&self, id: Uuid) -> AppResult<Option<Slide>> {
        self.inner.get_slide(id).await
    }

    async fn update_slide(&self, slide: &Slide) -> AppResult<()> {
        let first = self.before_first_slide_update.lock().is_none();
        if first {
            let slides = self.inner.list_slides(slide.set_id).await?;
            *self.before_first_slide_update.lock() = Some(slides);
        }
        self.inner.update_slide(slide).await
    }

    async fn list_slides(&self, set_id: Uuid) -> AppResult<Vec<Slide>> {
        self.inner.list_slides(set_id).await
    }

    async fn preset_ids_used_since(&self, since: DateTime<Utc>) -> AppResult<HashSet<Uuid>> {
        self.inner.preset_ids_used_since(since).await
    }

    async fn insert_cron_job(&self, job: CronJob) -> AppResult<()> {
        self.inner.insert_cron_job(job).await
    }

    async fn get_cron_job(&self, id: Uuid) -> AppResult<Option<CronJob>> {
        self.inner.get_cron_job(id).await
    }

    async fn list_enabled_cron_jobs(&self) -> AppResult<Vec<CronJob>> {
        self.inner.list_enabled_cron_jobs().await
    }

    async fn update_cron_job(&self, job: &CronJob) -> AppResult<()> {
        self.inner.update_cron_job(job).await
    }
}
