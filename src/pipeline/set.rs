//! Set generator - runs every slide of one set and finalizes it

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Preset, SetStatus, Slide, SlideInput, SlideSet, SlideStatus};
use crate::pipeline::manifest::SetManifest;
use crate::pipeline::slide::{SlideContext, SlideGenerator};
use crate::storage::{package_archive, paths, upload_json, ArchiveEntry, ObjectStorage};
use crate::store::Store;

/// One slide to create in a new set
#[derive(Debug, Clone, PartialEq)]
pub struct SlideSpec {
    pub preset_id: Option<Uuid>,
    pub input: SlideInput,
}

impl SlideSpec {
    pub fn from_preset(preset: &Preset) -> Self {
        Self {
            preset_id: Some(preset.id),
            input: SlideInput::from_preset(preset),
        }
    }

    /// Ad hoc slide not backed by a stored preset
    pub fn custom(style_prompt: impl Into<String>, negative_prompt: Option<String>) -> Self {
        Self {
            preset_id: None,
            input: SlideInput {
                style_prompt: style_prompt.into(),
                negative_prompt,
                ..Default::default()
            },
        }
    }
}

/// Persist `set` and one `queued` slide per `SlideSpec`, positions in input order.
pub async fn create_set(store: &dyn Store, set: SlideSet, specs: Vec<SlideSpec>) -> Result<Vec<Slide>> {
    let set_id = set.id;
    let mut slides = Vec::with_capacity(specs.len());
    for (position, spec) in specs.into_iter().enumerate() {
        slides.push(Slide::queued(&set, spec.preset_id, position as u32, spec.input));
    }

    store.insert_set(set).await?;
    for slide in &slides {
        store.insert_slide(slide.clone()).await?;
    }

    info!(set_id = %set_id, slides = slides.len(), "Set created");
    Ok(slides)
}

/// Outcome of one `generate_set` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetReport {
    pub set_id: Uuid,
    pub status: SetStatus,
    /// Slides in `succeeded` after this call, including ones left untouched
    pub succeeded: u32,
    pub failed: u32,
    /// Slides actually attempted by this call
    pub attempted: u32,
    pub manifest_path: String,
    pub archive_path: Option<String>,
}

pub struct SetGenerator {
    store: Arc<dyn Store>,
    storage: Arc<dyn ObjectStorage>,
    slides: SlideGenerator,
    concurrency: usize,
    slide_delay: Duration,
}

impl SetGenerator {
    pub fn new(
        store: Arc<dyn Store>,
        storage: Arc<dyn ObjectStorage>,
        slides: SlideGenerator,
        concurrency: usize,
        slide_delay: Duration,
    ) -> Self {
        Self {
            store,
            storage,
            slides,
            concurrency: concurrency.max(1),
            slide_delay,
        }
    }

    /// Generate every slide of `set_id` that has not already succeeded,
    /// then write the manifest and archive and settle the set status.
    pub async fn generate_set(&self, set_id: Uuid) -> Result<SetReport> {
        let mut set = self
            .store
            .get_set(set_id)
            .await?
            .ok_or_else(|| AppError::not_found("set", set_id))?;
        let subject = self
            .store
            .get_subject(set.subject_id)
            .await?
            .ok_or_else(|| AppError::not_found("subject", set.subject_id))?;
        let template = match set.template_id {
            Some(id) => Some(
                self.store
                    .get_template(id)
                    .await?
                    .ok_or_else(|| AppError::not_found("template", id))?,
            ),
            None => None,
        };

        let existing = self.store.list_slides(set_id).await?;
        let (mut finished, pending): (Vec<Slide>, Vec<Slide>) = existing
            .into_iter()
            .partition(|s| s.status == SlideStatus::Succeeded);
        let attempted = pending.len() as u32;

        set.status = SetStatus::Generating;
        self.store.update_set(&set).await?;
        info!(
            set_id = %set_id,
            pending = pending.len(),
            skipped = finished.len(),
            "Generating set"
        );

        let ctx = SlideContext {
            set: &set,
            subject: &subject,
            template: template.as_ref(),
        };

        let batches: Vec<&[Slide]> = pending.chunks(self.concurrency).collect();
        let batch_count = batches.len();
        for (index, batch) in batches.into_iter().enumerate() {
            let outcomes = join_all(batch.iter().map(|slide| self.slides.generate(slide.clone(), ctx))).await;
            finished.extend(outcomes);

            if index + 1 < batch_count && !self.slide_delay.is_zero() {
                tokio::time::sleep(self.slide_delay).await;
            }
        }
        finished.sort_by_key(|s| s.position);

        let succeeded = finished
            .iter()
            .filter(|s| s.status == SlideStatus::Succeeded)
            .count();
        let failed = finished.len() - succeeded;

        let settled = match self.publish(&mut set, &finished).await {
            Ok(()) => {
                set.status = if failed > 0 { SetStatus::Failed } else { SetStatus::Ready };
                self.store.update_set(&set).await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = settled {
            // every slide is terminal, so the set must not stay `generating`
            set.status = SetStatus::Failed;
            if let Err(store_err) = self.store.update_set(&set).await {
                warn!(set_id = %set_id, error = %store_err, "Could not mark set failed");
            }
            warn!(set_id = %set_id, error = %e, "Set finalization failed");
            return Err(e);
        }

        info!(
            set_id = %set_id,
            status = ?set.status,
            succeeded,
            failed,
            "Set finished"
        );

        Ok(SetReport {
            set_id,
            status: set.status,
            succeeded: succeeded as u32,
            failed: failed as u32,
            attempted,
            manifest_path: set.manifest_path.clone().unwrap_or_default(),
            archive_path: set.archive_path.clone(),
        })
    }

    /// Upload the manifest and, when anything succeeded, the archive.
    ///
    /// Each path is recorded on `set` as soon as its upload lands.
    async fn publish(&self, set: &mut SlideSet, finished: &[Slide]) -> Result<()> {
        let manifest = SetManifest::build(set, finished, self.slides.client().model(), self.storage.as_ref());
        let manifest_path = paths::set_manifest(set.id);
        upload_json(self.storage.as_ref(), &manifest_path, &manifest).await?;
        set.manifest_path = Some(manifest_path);

        let entries: Vec<ArchiveEntry> = finished
            .iter()
            .filter(|s| s.status == SlideStatus::Succeeded)
            .filter_map(|s| {
                s.output_path.as_ref().map(|path| ArchiveEntry {
                    filename: paths::slide_filename(s.position, s.input.style_name.as_deref()),
                    storage_path: path.clone(),
                })
            })
            .collect();

        set.archive_path = if entries.is_empty() {
            warn!(set_id = %set.id, "No slides succeeded, skipping archive");
            None
        } else {
            Some(package_archive(self.storage.as_ref(), &entries, &paths::set_archive(set.id)).await?)
        };
        Ok(())
    }
}
