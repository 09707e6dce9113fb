//! Stand-in portrait for a set, generated from a random model variation

use rand::seq::SliceRandom;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::{GenerationClient, GenerationInput};
use crate::models::Subject;
use crate::prompt::compose::DEFAULT_ASPECT_RATIO;
use crate::prompt::{compose_portrait_prompt, PORTRAIT_NEGATIVE};
use crate::storage::paths;
use crate::store::Store;

/// A generated stand-in ready to be attached to a set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandIn {
    pub variation_id: Uuid,
    pub image_path: String,
}

/// Generate a stand-in portrait for `set_id` when variations are configured.
///
/// Every failure is logged and yields `None`; the set then falls back to the
/// subject's own reference photos.
pub async fn prepare_stand_in(
    store: &dyn Store,
    client: &GenerationClient,
    subject: &Subject,
    set_id: Uuid,
) -> Option<StandIn> {
    let variations = match store.list_enabled_model_variations().await {
        Ok(variations) => variations,
        Err(e) => {
            warn!(set_id = %set_id, error = %e, "Could not list model variations");
            return None;
        }
    };

    let variation = variations.choose(&mut rand::thread_rng())?.clone();
    let output_path = paths::set_model_image(set_id);
    let input = GenerationInput {
        reference_paths: subject.reference_image_paths.clone(),
        prompt: compose_portrait_prompt(&variation),
        negative_prompt: Some(PORTRAIT_NEGATIVE.to_string()),
        aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
    };

    match client.generate(&input, &output_path).await {
        Ok(image) => {
            info!(set_id = %set_id, variation = %variation.name, "Model stand-in generated");
            Some(StandIn {
                variation_id: variation.id,
                image_path: image.storage_path,
            })
        }
        Err(e) => {
            warn!(
                set_id = %set_id,
                variation = %variation.name,
                error = %e,
                "Model stand-in failed, using subject references"
            );
            None
        }
    }
}
