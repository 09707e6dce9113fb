//! Styleset agent
//!
//! Batch generation of subject-locked hairstyle image sets: a rate-limited
//! generation client, slide and set generators, and a resumable run
//! orchestrator driven by durable run records.

pub mod agent;
pub mod api;
pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod scheduler;
pub mod storage;
pub mod store;

pub use error::{AppError, Result};

use std::sync::Arc;
use std::time::Duration;

use agent::Orchestrator;
use backend::{GeminiProvider, ImageProvider};
use client::{BackoffPolicy, CallGate, GenerationClient, IntervalGate};
use crate::config::Settings;
use pipeline::{SetGenerator, SlideGenerator};
use scheduler::CronRunner;
use storage::{LocalStorage, ObjectStorage};
use store::{MemoryStore, Store};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<dyn Store>,
    pub storage: Arc<dyn ObjectStorage>,
    pub orchestrator: Orchestrator,
    pub cron: Arc<CronRunner>,
}

impl AppState {
    /// Wire the pipeline from explicit collaborators
    pub fn new(
        settings: Settings,
        store: Arc<dyn Store>,
        storage: Arc<dyn ObjectStorage>,
        provider: Arc<dyn ImageProvider>,
        gate: Arc<dyn CallGate>,
    ) -> Self {
        let client = Arc::new(GenerationClient::new(
            provider,
            storage.clone(),
            gate,
            settings.provider.api_keys.clone(),
            BackoffPolicy::from_throttle(&settings.throttle),
        ));

        let slides = SlideGenerator::new(
            store.clone(),
            storage.clone(),
            client.clone(),
            BackoffPolicy::uncapped(settings.agent.slide_retries, settings.agent.retry_base()),
        );
        let sets = Arc::new(SetGenerator::new(
            store.clone(),
            storage.clone(),
            slides,
            settings.agent.concurrency,
            settings.agent.slide_delay(),
        ));

        let orchestrator = Orchestrator::new(store.clone(), client, sets, settings.agent.clone());
        let cron = Arc::new(CronRunner::new(store.clone(), orchestrator.clone()));

        Self {
            settings,
            store,
            storage,
            orchestrator,
            cron,
        }
    }

    /// Build the production wiring described by `settings`
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let store: Arc<dyn Store> = match &settings.store.snapshot_path {
            Some(path) => Arc::new(MemoryStore::open(path).await?),
            None => Arc::new(MemoryStore::new()),
        };
        let storage: Arc<dyn ObjectStorage> = Arc::new(LocalStorage::new(
            &settings.storage.base_path,
            &settings.storage.url_prefix,
        ));
        let provider: Arc<dyn ImageProvider> = Arc::new(GeminiProvider::new(&settings.provider)?);
        let gate: Arc<dyn CallGate> = Arc::new(IntervalGate::new(Duration::from_millis(
            settings.throttle.min_interval_ms,
        )));

        Ok(Self::new(settings, store, storage, provider, gate))
    }
}
