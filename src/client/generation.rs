//! Rate-limited generation client with credential rotation

use rand::seq::SliceRandom;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{ImageProvider, ProviderError, ProviderRequest, ReferenceImage};
use crate::client::backoff::BackoffPolicy;
use crate::client::gate::CallGate;
use crate::storage::{content_hash, image_mime_type, ObjectStorage};

/// One logical "generate an image" operation
#[derive(Debug, Clone)]
pub struct GenerationInput {
    /// Storage paths of the reference images
    pub reference_paths: Vec<String>,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub aspect_ratio: String,
}

/// A generated image persisted to storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub storage_path: String,
    pub url: String,
    /// SHA-256 of the image bytes
    pub hash: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("No provider API keys configured")]
    NoCredentials,

    /// Every credential and its retry budget was used up; carries the last error
    #[error("{0}")]
    Exhausted(String),
}

/// Client wrapping a provider with throttling, backoff and key rotation
pub struct GenerationClient {
    provider: Arc<dyn ImageProvider>,
    storage: Arc<dyn ObjectStorage>,
    gate: Arc<dyn CallGate>,
    api_keys: Vec<String>,
    backoff: BackoffPolicy,
}

fn key_suffix(key: &str) -> String {
    let tail: Vec<char> = key.chars().rev().take(4).collect();
    tail.into_iter().rev().collect()
}

/// Text sent to the provider: the prompt plus the negative list, which the
/// provider has no dedicated field for.
pub fn outbound_prompt(prompt: &str, negative_prompt: Option<&str>) -> String {
    match negative_prompt.map(str::trim).filter(|n| !n.is_empty()) {
        Some(negative) => format!(
            "{}\n\nIMPORTANT: DO NOT include any of the following: {}",
            prompt, negative
        ),
        None => prompt.to_string(),
    }
}

impl GenerationClient {
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        storage: Arc<dyn ObjectStorage>,
        gate: Arc<dyn CallGate>,
        api_keys: Vec<String>,
        backoff: BackoffPolicy,
    ) -> Self {
        let api_keys = api_keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        Self {
            provider,
            storage,
            gate,
            api_keys,
            backoff,
        }
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Fetch reference images, skipping any that cannot be downloaded
    async fn load_references(&self, paths: &[String]) -> Vec<ReferenceImage> {
        let mut references = Vec::with_capacity(paths.len());
        for path in paths {
            match self.storage.download(path).await {
                Ok(data) => references.push(ReferenceImage {
                    mime_type: image_mime_type(path, &data).to_string(),
                    data,
                }),
                Err(e) => warn!(path = %path, error = %e, "Could not download reference image"),
            }
        }
        references
    }

    /// One provider call followed by the upload of its first image
    async fn attempt(
        &self,
        api_key: &str,
        request: &ProviderRequest,
        output_path: &str,
    ) -> Result<GeneratedImage, ProviderError> {
        let response = self.provider.generate(api_key, request).await?;

        let data = response.first_image().ok_or_else(|| {
            ProviderError::EmptyResponse("response parts present but no image data found".to_string())
        })?;

        let hash = content_hash(data);
        let url = self
            .storage
            .upload(output_path, data, image_mime_type(output_path, data))
            .await
            .map_err(|e| ProviderError::Other(format!("Storage upload failed: {}", e)))?;

        Ok(GeneratedImage {
            storage_path: output_path.to_string(),
            url,
            hash,
        })
    }

    /// Generate one image and store it at `output_path`.
    ///
    /// Credentials are tried in random order. Rate-limited and empty responses
    /// are retried on the same credential with exponential backoff; any other
    /// failure moves straight on to the next credential.
    pub async fn generate(
        &self,
        input: &GenerationInput,
        output_path: &str,
    ) -> Result<GeneratedImage, GenerationError> {
        if self.api_keys.is_empty() {
            return Err(GenerationError::NoCredentials);
        }

        let request = ProviderRequest {
            references: self.load_references(&input.reference_paths).await,
            prompt: outbound_prompt(&input.prompt, input.negative_prompt.as_deref()),
            aspect_ratio: input.aspect_ratio.clone(),
        };

        let mut keys = self.api_keys.clone();
        keys.shuffle(&mut rand::thread_rng());

        let mut last_error: Option<ProviderError> = None;

        for key in &keys {
            let mut retry = 0u32;
            loop {
                self.gate.wait_turn().await;

                match self.attempt(key, &request, output_path).await {
                    Ok(image) => {
                        info!(
                            provider = %self.provider.name(),
                            path = %output_path,
                            hash = %image.hash,
                            "Image generated"
                        );
                        return Ok(image);
                    }
                    Err(e) if e.is_retryable() && self.backoff.allows_retry(retry) => {
                        let delay = self.backoff.delay_for(retry);
                        retry += 1;
                        warn!(
                            key = %key_suffix(key),
                            attempt = retry,
                            max_attempts = self.backoff.retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Retryable provider failure, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => {
                        warn!(key = %key_suffix(key), error = %e, "Credential failed");
                        last_error = Some(e);
                        break;
                    }
                }
            }
        }

        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "All provider credentials failed".to_string());
        debug!(error = %message, "Generation exhausted");
        Err(GenerationError::Exhausted(message))
    }
}
