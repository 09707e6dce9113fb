//! In-process record store with an optional JSON snapshot on disk

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    CronJob, ModelVariation, Preset, Run, Slide, SlideSet, Subject, Template,
};
use crate::store::{RunChange, Store};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    subjects: HashMap<Uuid, Subject>,
    #[serde(default)]
    templates: HashMap<Uuid, Template>,
    #[serde(default)]
    presets: HashMap<Uuid, Preset>,
    #[serde(default)]
    model_variations: HashMap<Uuid, ModelVariation>,
    #[serde(default)]
    runs: HashMap<Uuid, Run>,
    #[serde(default)]
    sets: HashMap<Uuid, SlideSet>,
    #[serde(default)]
    slides: HashMap<Uuid, Slide>,
    #[serde(default)]
    cron_jobs: HashMap<Uuid, CronJob>,
}

/// Record store backed by in-memory maps.
///
/// When opened with a snapshot path every mutation rewrites the snapshot
/// before returning, so a restarted process sees exactly the state that was
/// acknowledged to callers.
pub struct MemoryStore {
    state: RwLock<StoreState>,
    snapshot_path: Option<PathBuf>,
    /// Serializes mutate-then-persist so snapshots land on disk in order.
    write_lock: Mutex<()>,
}

impl MemoryStore {
    /// Create a store that keeps records only in memory
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            snapshot_path: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Open a store persisted to `path`, loading the existing snapshot if any
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = match fs::read(&path).await {
            Ok(bytes) => {
                let state: StoreState = serde_json::from_slice(&bytes)?;
                info!(
                    path = ?path,
                    runs = state.runs.len(),
                    sets = state.sets.len(),
                    slides = state.slides.len(),
                    "Loaded store snapshot"
                );
                state
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(AppError::Io(e)),
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        Ok(Self {
            state: RwLock::new(state),
            snapshot_path: Some(path),
            write_lock: Mutex::new(()),
        })
    }

    async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut StoreState) -> Result<T>,
    {
        let _guard = self.write_lock.lock().await;

        let (value, snapshot) = {
            let mut state = self.state.write();
            let value = f(&mut state)?;
            let snapshot = match &self.snapshot_path {
                Some(_) => Some(serde_json::to_vec(&*state)?),
                None => None,
            };
            (value, snapshot)
        };

        if let (Some(path), Some(bytes)) = (&self.snapshot_path, snapshot) {
            let tmp = path.with_extension("tmp");
            fs::write(&tmp, &bytes).await?;
            fs::rename(&tmp, path).await?;
            debug!(path = ?path, size = bytes.len(), "Wrote store snapshot");
        }

        Ok(value)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn replace<T>(map: &mut HashMap<Uuid, T>, id: Uuid, value: T, kind: &str) -> Result<()> {
    match map.get_mut(&id) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(AppError::not_found(kind, id)),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_subject(&self, subject: Subject) -> Result<()> {
        self.mutate(|s| {
            s.subjects.insert(subject.id, subject);
            Ok(())
        })
        .await
    }

    async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>> {
        Ok(self.state.read().subjects.get(&id).cloned())
    }

    async fn first_subject(&self) -> Result<Option<Subject>> {
        Ok(self
            .state
            .read()
            .subjects
            .values()
            .min_by_key(|s| s.created_at)
            .cloned())
    }

    async fn insert_template(&self, template: Template) -> Result<()> {
        self.mutate(|s| {
            s.templates.insert(template.id, template);
            Ok(())
        })
        .await
    }

    async fn get_template(&self, id: Uuid) -> Result<Option<Template>> {
        Ok(self.state.read().templates.get(&id).cloned())
    }

    async fn first_template(&self) -> Result<Option<Template>> {
        Ok(self
            .state
            .read()
            .templates
            .values()
            .min_by_key(|t| t.created_at)
            .cloned())
    }

    async fn insert_preset(&self, preset: Preset) -> Result<()> {
        self.mutate(|s| {
            s.presets.insert(preset.id, preset);
            Ok(())
        })
        .await
    }

    async fn get_preset(&self, id: Uuid) -> Result<Option<Preset>> {
        Ok(self.state.read().presets.get(&id).cloned())
    }

    async fn list_presets(&self) -> Result<Vec<Preset>> {
        let mut presets: Vec<Preset> = self.state.read().presets.values().cloned().collect();
        presets.sort_by_key(|p| p.created_at);
        Ok(presets)
    }

    async fn insert_model_variation(&self, variation: ModelVariation) -> Result<()> {
        self.mutate(|s| {
            s.model_variations.insert(variation.id, variation);
            Ok(())
        })
        .await
    }

    async fn list_enabled_model_variations(&self) -> Result<Vec<ModelVariation>> {
        let mut variations: Vec<ModelVariation> = self
            .state
            .read()
            .model_variations
            .values()
            .filter(|v| v.enabled)
            .cloned()
            .collect();
        variations.sort_by_key(|v| v.created_at);
        Ok(variations)
    }

    async fn insert_run(&self, run: Run) -> Result<()> {
        self.mutate(|s| {
            s.runs.insert(run.id, run);
            Ok(())
        })
        .await
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<Run>> {
        Ok(self.state.read().runs.get(&id).cloned())
    }

    async fn modify_run(&self, id: Uuid, change: RunChange) -> Result<Run> {
        self.mutate(|s| {
            let slot = s.runs.get_mut(&id).ok_or_else(|| AppError::not_found("run", id))?;
            let mut run = slot.clone();
            change(&mut run)?;
            *slot = run.clone();
            Ok(run)
        })
        .await
    }

    async fn insert_set(&self, set: SlideSet) -> Result<()> {
        self.mutate(|s| {
            s.sets.insert(set.id, set);
            Ok(())
        })
        .await
    }

    async fn get_set(&self, id: Uuid) -> Result<Option<SlideSet>> {
        Ok(self.state.read().sets.get(&id).cloned())
    }

    async fn update_set(&self, set: &SlideSet) -> Result<()> {
        let mut set = set.clone();
        set.updated_at = Utc::now();
        self.mutate(|s| replace(&mut s.sets, set.id, set, "set")).await
    }

    async fn insert_slide(&self, slide: Slide) -> Result<()> {
        self.mutate(|s| {
            if !s.sets.contains_key(&slide.set_id) {
                return Err(AppError::not_found("set", slide.set_id));
            }
            s.slides.insert(slide.id, slide);
            Ok(())
        })
        .await
    }

    async fn get_slide(&self, id: Uuid) -> Result<Option<Slide>> {
        Ok(self.state.read().slides.get(&id).cloned())
    }

    async fn update_slide(&self, slide: &Slide) -> Result<()> {
        let mut slide = slide.clone();
        slide.updated_at = Utc::now();
        self.mutate(|s| replace(&mut s.slides, slide.id, slide, "slide"))
            .await
    }

    async fn list_slides(&self, set_id: Uuid) -> Result<Vec<Slide>> {
        let mut slides: Vec<Slide> = self
            .state
            .read()
            .slides
            .values()
            .filter(|s| s.set_id == set_id)
            .cloned()
            .collect();
        slides.sort_by_key(|s| s.position);
        Ok(slides)
    }

    async fn preset_ids_used_since(&self, since: DateTime<Utc>) -> Result<HashSet<Uuid>> {
        Ok(self
            .state
            .read()
            .slides
            .values()
            .filter(|s| s.created_at >= since)
            .filter_map(|s| s.preset_id)
            .collect())
    }

    async fn insert_cron_job(&self, job: CronJob) -> Result<()> {
        self.mutate(|s| {
            s.cron_jobs.insert(job.id, job);
            Ok(())
        })
        .await
    }

    async fn get_cron_job(&self, id: Uuid) -> Result<Option<CronJob>> {
        Ok(self.state.read().cron_jobs.get(&id).cloned())
    }

    async fn list_enabled_cron_jobs(&self) -> Result<Vec<CronJob>> {
        let mut jobs: Vec<CronJob> = self
            .state
            .read()
            .cron_jobs
            .values()
            .filter(|j| j.enabled)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn update_cron_job(&self, job: &CronJob) -> Result<()> {
        self.mutate(|s| replace(&mut s.cron_jobs, job.id, job.clone(), "cron job"))
            .await
    }
}
