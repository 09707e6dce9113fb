//! Common traits and types for image generation providers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reference image sent inline with a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Request to generate one image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Reference photos, in the order they should be presented
    pub references: Vec<ReferenceImage>,

    /// Full instruction text, negative terms included
    pub prompt: String,

    /// Target aspect ratio such as "3:4"
    pub aspect_ratio: String,
}

/// One part of a provider response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    Image { mime_type: String, data: Vec<u8> },
    Text(String),
}

/// Response from a single generate call
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub parts: Vec<ResponsePart>,

    /// Provider-reported reason the generation stopped
    pub finish_reason: Option<String>,
}

impl ProviderResponse {
    /// Bytes of the first part that carries image data
    pub fn first_image(&self) -> Option<&[u8]> {
        self.parts.iter().find_map(|part| match part {
            ResponsePart::Image { data, .. } if !data.is_empty() => Some(data.as_slice()),
            _ => None,
        })
    }
}

/// Failure of a single provider call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Quota or too-many-requests signal
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The response carried no image data (refusal, safety filter, flake)
    #[error("No image generated: {0}")]
    EmptyResponse(String),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Rate-limited and empty responses are retried on the same credential
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_) | ProviderError::EmptyResponse(_))
    }
}

/// Trait for external image generation providers
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Provider name used in logs
    fn name(&self) -> &str;

    /// Model identifier recorded in set manifests
    fn model(&self) -> &str;

    /// Perform one generate call with the given credential
    async fn generate(
        &self,
        api_key: &str,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError>;
}
