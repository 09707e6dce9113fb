//! Durable records shared by the store, the pipeline and the orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::scheduler::{JobAction, Schedule};

/// The person whose reference photos anchor every generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    /// Storage paths of the original reference photos.
    pub reference_image_paths: Vec<String>,
    /// Scene attributes that must survive every generation (wardrobe, background, ...).
    #[serde(default)]
    pub locked_attributes: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Subject {
    pub fn new(name: impl Into<String>, reference_image_paths: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            reference_image_paths,
            locked_attributes: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }
}

/// Prompt fields of a slide request template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplatePrompt {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub lighting: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub base_prompt: TemplatePrompt,
    pub created_at: DateTime<Utc>,
}

impl Template {
    pub fn new(name: impl Into<String>, base_prompt: TemplatePrompt) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            base_prompt,
            created_at: Utc::now(),
        }
    }
}

/// A reusable hairstyle description. Never mutated by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub id: Uuid,
    pub name: String,
    pub style_prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Preset {
    pub fn new(name: impl Into<String>, style_prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            style_prompt: style_prompt.into(),
            negative_prompt: None,
            created_at: Utc::now(),
        }
    }
}

/// An alternate synthetic persona that can stand in for the subject in one set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVariation {
    pub id: Uuid,
    pub name: String,
    /// Persona description: origin, age range, hair colour, casting notes.
    pub persona: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl ModelVariation {
    pub fn new(name: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            persona: persona.into(),
            enabled: true,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Paused,
    Cancelled,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Resolved configuration a run was launched with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub subject_id: Uuid,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    pub sets_per_day: u32,
    pub slides_per_set: u32,
    #[serde(default)]
    pub pause_between_sets: bool,
}

/// One orchestrated execution of several sets for one subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub sets_planned: u32,
    pub slides_total: u32,
    pub sets_completed: u32,
    pub sets_failed: u32,
    pub slides_succeeded: u32,
    pub slides_failed: u32,
    pub status: RunStatus,
    pub config: RunConfig,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Run {
    pub fn new(config: RunConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            sets_planned: config.sets_per_day,
            slides_total: config.sets_per_day * config.slides_per_set,
            sets_completed: 0,
            sets_failed: 0,
            slides_succeeded: 0,
            slides_failed: 0,
            status: RunStatus::Running,
            config,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Index of the first set that has not been attempted yet.
    pub fn next_set_index(&self) -> u32 {
        self.sets_completed + self.sets_failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetStatus {
    Idle,
    Generating,
    Ready,
    Failed,
}

/// A named collection of slides produced together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideSet {
    pub id: Uuid,
    pub subject_id: Uuid,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    #[serde(default)]
    pub model_variation_id: Option<Uuid>,
    /// Stand-in portrait used instead of the subject's photos, when generated.
    #[serde(default)]
    pub model_image_path: Option<String>,
    pub name: String,
    pub status: SetStatus,
    pub output_dir: String,
    #[serde(default)]
    pub manifest_path: Option<String>,
    #[serde(default)]
    pub archive_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SlideSet {
    pub fn new(subject_id: Uuid, template_id: Option<Uuid>, name: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now();
        Self {
            id,
            subject_id,
            template_id,
            model_variation_id: None,
            model_image_path: None,
            name: name.into(),
            status: SetStatus::Idle,
            output_dir: format!("sets/{}", id),
            manifest_path: None,
            archive_path: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl SlideStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SlideStatus::Succeeded | SlideStatus::Failed)
    }
}

/// Input parameters frozen onto a slide so it survives preset deletion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlideInput {
    #[serde(default)]
    pub style_name: Option<String>,
    pub style_prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    /// Content hashes of the reference images used, `unreadable` when a
    /// reference could not be fetched.
    #[serde(default)]
    pub reference_hashes: Vec<String>,
}

impl SlideInput {
    pub fn from_preset(preset: &Preset) -> Self {
        Self {
            style_name: Some(preset.name.clone()),
            style_prompt: preset.style_prompt.clone(),
            negative_prompt: preset.negative_prompt.clone(),
            reference_hashes: Vec::new(),
        }
    }
}

/// One preset applied to one set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slide {
    pub id: Uuid,
    pub set_id: Uuid,
    pub subject_id: Uuid,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    #[serde(default)]
    pub preset_id: Option<Uuid>,
    pub position: u32,
    pub input: SlideInput,
    #[serde(default)]
    pub final_prompt: Option<String>,
    pub status: SlideStatus,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Slide {
    pub fn queued(set: &SlideSet, preset_id: Option<Uuid>, position: u32, input: SlideInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            set_id: set.id,
            subject_id: set.subject_id,
            template_id: set.template_id,
            preset_id,
            position,
            input,
            final_prompt: None,
            status: SlideStatus::Queued,
            output_path: None,
            error: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobResult {
    Success,
    Failed,
}

/// A cron-like trigger with a typed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJob {
    pub id: Uuid,
    pub name: String,
    pub schedule: Schedule,
    pub enabled: bool,
    pub action: JobAction,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_result: Option<JobResult>,
    #[serde(default)]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CronJob {
    pub fn new(name: impl Into<String>, schedule: Schedule, action: JobAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            schedule,
            enabled: true,
            action,
            last_run_at: None,
            last_result: None,
            last_error: None,
            created_at: Utc::now(),
        }
    }
}
