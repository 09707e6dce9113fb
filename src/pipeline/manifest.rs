//! Set manifest written next to every processed set

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Slide, SlideSet, SlideStatus};
use crate::storage::ObjectStorage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestHairstyle {
    pub preset_id: Option<Uuid>,
    pub name: Option<String>,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSlide {
    pub position: u32,
    pub status: SlideStatus,
    pub storage_path: Option<String>,
    pub url: Option<String>,
    pub retries: u32,
    pub hairstyle: ManifestHairstyle,
    pub error: Option<String>,
}

/// Ordered record of every slide outcome of one set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetManifest {
    pub set_id: Uuid,
    pub subject_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub model: String,
    pub slides: Vec<ManifestSlide>,
}

impl SetManifest {
    /// Build the manifest from terminal slides; input order does not matter.
    pub fn build(set: &SlideSet, slides: &[Slide], model: &str, storage: &dyn ObjectStorage) -> Self {
        let mut entries: Vec<ManifestSlide> = slides
            .iter()
            .map(|slide| ManifestSlide {
                position: slide.position,
                status: slide.status,
                storage_path: slide.output_path.clone(),
                url: slide.output_path.as_deref().map(|p| storage.public_url(p)),
                retries: slide.retry_count,
                hairstyle: ManifestHairstyle {
                    preset_id: slide.preset_id,
                    name: slide.input.style_name.clone(),
                    prompt: slide.input.style_prompt.clone(),
                },
                error: slide.error.clone(),
            })
            .collect();
        entries.sort_by_key(|entry| entry.position);

        Self {
            set_id: set.id,
            subject_id: set.subject_id,
            name: set.name.clone(),
            created_at: set.created_at,
            model: model.to_string(),
            slides: entries,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.slides
            .iter()
            .filter(|s| s.status == SlideStatus::Succeeded)
            .count()
    }
}
