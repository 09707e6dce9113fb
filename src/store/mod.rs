//! Record store - the durable source of truth for runs, sets and slides

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    CronJob, ModelVariation, Preset, Run, Slide, SlideSet, Subject, Template,
};

pub use memory::MemoryStore;

/// Edit applied to a stored run under the store's write path
pub type RunChange = Box<dyn FnOnce(&mut Run) -> Result<()> + Send>;

/// Persistence contract consumed by the pipeline and the orchestrator.
///
/// `update_*` methods replace the whole record and fail with
/// [`AppError::NotFound`](crate::error::AppError::NotFound) when the id is unknown.
/// Runs are shared between the orchestrator loop and API callers, so they are
/// only ever changed through [`Store::modify_run`].
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_subject(&self, subject: Subject) -> Result<()>;
    async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>>;
    /// Oldest subject, used when a run names none.
    async fn first_subject(&self) -> Result<Option<Subject>>;

    async fn insert_template(&self, template: Template) -> Result<()>;
    async fn get_template(&self, id: Uuid) -> Result<Option<Template>>;
    async fn first_template(&self) -> Result<Option<Template>>;

    async fn insert_preset(&self, preset: Preset) -> Result<()>;
    async fn get_preset(&self, id: Uuid) -> Result<Option<Preset>>;
    /// All presets, oldest first.
    async fn list_presets(&self) -> Result<Vec<Preset>>;

    async fn insert_model_variation(&self, variation: ModelVariation) -> Result<()>;
    async fn list_enabled_model_variations(&self) -> Result<Vec<ModelVariation>>;

    async fn insert_run(&self, run: Run) -> Result<()>;
    async fn get_run(&self, id: Uuid) -> Result<Option<Run>>;
    /// Apply `change` to the stored run atomically with respect to every
    /// other mutation and return the result. Nothing is written if `change` fails.
    async fn modify_run(&self, id: Uuid, change: RunChange) -> Result<Run>;

    async fn insert_set(&self, set: SlideSet) -> Result<()>;
    async fn get_set(&self, id: Uuid) -> Result<Option<SlideSet>>;
    async fn update_set(&self, set: &SlideSet) -> Result<()>;

    async fn insert_slide(&self, slide: Slide) -> Result<()>;
    async fn get_slide(&self, id: Uuid) -> Result<Option<Slide>>;
    async fn update_slide(&self, slide: &Slide) -> Result<()>;
    /// Slides of one set ordered by position.
    async fn list_slides(&self, set_id: Uuid) -> Result<Vec<Slide>>;
    /// Distinct presets referenced by slides created at or after `since`.
    async fn preset_ids_used_since(&self, since: DateTime<Utc>) -> Result<HashSet<Uuid>>;

    async fn insert_cron_job(&self, job: CronJob) -> Result<()>;
    async fn get_cron_job(&self, id: Uuid) -> Result<Option<CronJob>>;
    /// Enabled jobs, newest first.
    async fn list_enabled_cron_jobs(&self) -> Result<Vec<CronJob>>;
    async fn update_cron_job(&self, job: &CronJob) -> Result<()>;
}
