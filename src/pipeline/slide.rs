//! Slide generator - brings one slide to a terminal state

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::client::{BackoffPolicy, GenerationClient, GenerationInput};
use crate::models::{Slide, SlideSet, SlideStatus, Subject, Template, TemplatePrompt};
use crate::prompt::{compose_prompt, validate_prompt_safety, ComposeInput};
use crate::storage::{content_hash, paths, ObjectStorage};
use crate::store::Store;

/// Marker recorded in place of a hash when a reference cannot be read
pub const UNREADABLE_HASH: &str = "unreadable";

/// Records a slide is generated against
#[derive(Debug, Clone, Copy)]
pub struct SlideContext<'a> {
    pub set: &'a SlideSet,
    pub subject: &'a Subject,
    pub template: Option<&'a Template>,
}

impl SlideContext<'_> {
    /// The set's stand-in portrait wins over the subject's own photos
    pub fn reference_paths(&self) -> Vec<String> {
        match &self.set.model_image_path {
            Some(path) => vec![path.clone()],
            None => self.subject.reference_image_paths.clone(),
        }
    }
}

pub struct SlideGenerator {
    store: Arc<dyn Store>,
    storage: Arc<dyn ObjectStorage>,
    client: Arc<GenerationClient>,
    retry: BackoffPolicy,
}

impl SlideGenerator {
    pub fn new(
        store: Arc<dyn Store>,
        storage: Arc<dyn ObjectStorage>,
        client: Arc<GenerationClient>,
        retry: BackoffPolicy,
    ) -> Self {
        Self {
            store,
            storage,
            client,
            retry,
        }
    }

    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    async fn persist(&self, slide: &Slide) {
        if let Err(e) = self.store.update_slide(slide).await {
            error!(slide_id = %slide.id, status = ?slide.status, error = %e, "Failed to persist slide");
        }
    }

    async fn reference_hashes(&self, paths: &[String]) -> Vec<String> {
        let mut hashes = Vec::with_capacity(paths.len());
        for path in paths {
            match self.storage.download(path).await {
                Ok(data) => hashes.push(content_hash(&data)),
                Err(e) => {
                    warn!(path = %path, error = %e, "Reference image unreadable");
                    hashes.push(UNREADABLE_HASH.to_string());
                }
            }
        }
        hashes
    }

    /// Run one slide to completion.
    ///
    /// Never fails: every error ends up as a persisted `failed` slide. The
    /// returned slide is always terminal and mirrors what was written.
    pub async fn generate(&self, mut slide: Slide, ctx: SlideContext<'_>) -> Slide {
        let references = ctx.reference_paths();

        if let Err(violation) =
            validate_prompt_safety(&slide.input.style_prompt, slide.input.negative_prompt.as_deref())
        {
            warn!(slide_id = %slide.id, position = slide.position, term = violation.term, "Slide rejected by safety check");
            slide.status = SlideStatus::Failed;
            slide.error = Some(violation.to_string());
            slide.retry_count = 0;
            self.persist(&slide).await;
            return slide;
        }

        let default_prompt = TemplatePrompt::default();
        let composed = compose_prompt(ComposeInput {
            locked_attributes: &ctx.subject.locked_attributes,
            base_prompt: ctx.template.map(|t| &t.base_prompt).unwrap_or(&default_prompt),
            style_prompt: &slide.input.style_prompt,
            negative_style_prompt: slide.input.negative_prompt.as_deref(),
        });

        slide.input.reference_hashes = self.reference_hashes(&references).await;
        slide.final_prompt = Some(composed.prompt.clone());
        slide.status = SlideStatus::Running;
        slide.error = None;
        slide.output_path = None;
        self.persist(&slide).await;

        let output_path = paths::set_image(
            slide.set_id,
            &paths::slide_filename(slide.position, slide.input.style_name.as_deref()),
        );
        let input = GenerationInput {
            reference_paths: references,
            prompt: composed.prompt,
            negative_prompt: Some(composed.negative_prompt),
            aspect_ratio: composed.metadata.aspect_ratio,
        };

        let mut attempt = 0u32;
        loop {
            match self.client.generate(&input, &output_path).await {
                Ok(image) => {
                    slide.status = SlideStatus::Succeeded;
                    slide.output_path = Some(image.storage_path);
                    slide.error = None;
                    slide.retry_count = attempt;
                    info!(slide_id = %slide.id, position = slide.position, retries = attempt, "Slide succeeded");
                    break;
                }
                Err(e) if self.retry.allows_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    attempt += 1;
                    warn!(
                        slide_id = %slide.id,
                        position = slide.position,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Slide attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    slide.status = SlideStatus::Failed;
                    slide.error = Some(e.to_string());
                    slide.retry_count = attempt;
                    error!(slide_id = %slide.id, position = slide.position, error = %e, "Slide failed");
                    break;
                }
            }
        }

        self.persist(&slide).await;
        slide
    }
}
