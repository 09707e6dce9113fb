//! Manual repair of sets left behind by an interrupted process

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{SetStatus, SlideStatus};
use crate::pipeline::set::{SetGenerator, SetReport};
use crate::store::Store;

pub const STUCK_SLIDE_ERROR: &str = "Marked failed by repair: slide was stuck in running state";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub set_id: Uuid,
    /// Slides moved from `running` to `failed`
    pub stuck: u32,
    /// Slides moved back to `queued`
    pub requeued: u32,
    pub status: SetStatus,
    /// Present when queued work was regenerated
    pub generation: Option<SetReport>,
}

/// Fail slides stuck in `running`, optionally requeue failures, settle the
/// set status and regenerate whatever is left queued.
pub async fn repair_set(
    store: &dyn Store,
    generator: &SetGenerator,
    set_id: Uuid,
    requeue: bool,
) -> Result<RepairReport> {
    let mut set = store
        .get_set(set_id)
        .await?
        .ok_or_else(|| AppError::not_found("set", set_id))?;

    let mut slides = store.list_slides(set_id).await?;
    let mut stuck = 0u32;
    let mut requeued = 0u32;

    for slide in slides.iter_mut() {
        if slide.status == SlideStatus::Running {
            slide.status = SlideStatus::Failed;
            slide.error = Some(STUCK_SLIDE_ERROR.to_string());
            store.update_slide(slide).await?;
            stuck += 1;
        }
        if requeue && slide.status == SlideStatus::Failed {
            slide.status = SlideStatus::Queued;
            slide.error = None;
            slide.retry_count = 0;
            store.update_slide(slide).await?;
            requeued += 1;
        }
    }

    let queued = slides.iter().any(|s| s.status == SlideStatus::Queued);
    let any_failed = slides.iter().any(|s| s.status == SlideStatus::Failed);
    let any_succeeded = slides.iter().any(|s| s.status == SlideStatus::Succeeded);
    set.status = if queued {
        SetStatus::Idle
    } else if any_failed && !any_succeeded {
        SetStatus::Failed
    } else {
        SetStatus::Ready
    };
    store.update_set(&set).await?;

    info!(set_id = %set_id, stuck, requeued, status = ?set.status, "Set repaired");

    let generation = if queued {
        Some(generator.generate_set(set_id).await?)
    } else {
        None
    };
    let status = generation.as_ref().map(|g| g.status).unwrap_or(set.status);

    Ok(RepairReport {
        set_id,
        stuck,
        requeued,
        status,
        generation,
    })
}
