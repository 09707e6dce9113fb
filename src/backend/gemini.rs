//! Gemini `generateContent` provider

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::traits::{
    ImageProvider, ProviderError, ProviderRequest, ProviderResponse, ResponsePart,
};
use crate::config::ProviderConfig;
use crate::error::Result;

/// Image provider speaking the Gemini REST API
pub struct GeminiProvider {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerateRequest {
    contents: Vec<ApiContent>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct ApiContent {
    role: &'static str,
    parts: Vec<ApiRequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ApiRequestPart {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: ApiInlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInlineData {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    response_modalities: Vec<&'static str>,
    image_config: ApiImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiImageConfig {
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerateResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiCandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidateContent {
    #[serde(default)]
    parts: Option<Vec<ApiResponsePart>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<ApiInlineData>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GeminiProvider {
    /// Create a new provider from configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model)
    }

    fn build_request(request: &ProviderRequest) -> ApiGenerateRequest {
        let mut parts: Vec<ApiRequestPart> = request
            .references
            .iter()
            .map(|reference| ApiRequestPart::Inline {
                inline_data: ApiInlineData {
                    mime_type: reference.mime_type.clone(),
                    data: STANDARD.encode(&reference.data),
                },
            })
            .collect();
        parts.push(ApiRequestPart::Text {
            text: request.prompt.clone(),
        });

        ApiGenerateRequest {
            contents: vec![ApiContent { role: "user", parts }],
            generation_config: ApiGenerationConfig {
                response_modalities: vec!["IMAGE"],
                image_config: ApiImageConfig {
                    aspect_ratio: request.aspect_ratio.clone(),
                },
            },
        }
    }

    fn parse_response(body: ApiGenerateResponse) -> std::result::Result<ProviderResponse, ProviderError> {
        let candidate = body.candidates.into_iter().next();
        let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());

        let parts = candidate
            .and_then(|c| c.content)
            .and_then(|content| content.parts)
            .filter(|parts| !parts.is_empty());

        let Some(parts) = parts else {
            let reason = finish_reason.unwrap_or_else(|| "unknown".to_string());
            let feedback = body
                .prompt_feedback
                .map(|f| f.to_string())
                .unwrap_or_else(|| "none".to_string());
            warn!(finish_reason = %reason, prompt_feedback = %feedback, "Empty provider response");
            return Err(ProviderError::EmptyResponse(format!("finishReason: {}", reason)));
        };

        let mut decoded = Vec::with_capacity(parts.len());
        for part in parts {
            if let Some(inline) = part.inline_data {
                if inline.data.is_empty() {
                    continue;
                }
                let data = STANDARD
                    .decode(inline.data.trim())
                    .map_err(|e| ProviderError::Other(format!("Invalid base64 image data: {}", e)))?;
                decoded.push(ResponsePart::Image {
                    mime_type: inline.mime_type,
                    data,
                });
            } else if let Some(text) = part.text {
                decoded.push(ResponsePart::Text(text));
            }
        }

        Ok(ProviderResponse {
            parts: decoded,
            finish_reason,
        })
    }
}

/// Map a non-success HTTP answer onto the provider error taxonomy
pub fn classify_failure(status: StatusCode, body: &str) -> ProviderError {
    let (message, api_status) = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => (parsed.error.message, parsed.error.status),
        Err(_) => (body.trim().to_string(), String::new()),
    };
    let detail = format!("HTTP {}: {}", status.as_u16(), message);

    let lower = message.to_lowercase();
    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || api_status == "RESOURCE_EXHAUSTED"
        || lower.contains("quota")
        || lower.contains("rate limit")
        || lower.contains("too many requests");

    if rate_limited {
        ProviderError::RateLimited(detail)
    } else {
        ProviderError::Other(detail)
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        api_key: &str,
        request: &ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = self.url();
        debug!(
            model = %self.model,
            references = request.references.len(),
            prompt_len = request.prompt.len(),
            "Sending generate request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&Self::build_request(request))
            .send()
            .await
            .map_err(|e| ProviderError::Other(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let body: ApiGenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Other(format!("Failed to parse response: {}", e)))?;

        Self::parse_response(body)
    }
}
