//! Functional tests for the Gemini provider against a mock server

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::json;
use styleset_agent::backend::{
    GeminiProvider, ImageProvider, ProviderError, ProviderRequest, ReferenceImage,
};
use styleset_agent::config::ProviderConfig;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/v1beta/models/test-model:generateContent";

fn provider(server: &MockServer) -> GeminiProvider {
    let config = ProviderConfig {
        endpoint: server.uri(),
        model: "test-model".to_string(),
        api_keys: vec!["k1".to_string()],
        timeout_ms: 5_000,
    };
    GeminiProvider::new(&config).unwrap()
}

fn request() -> ProviderRequest {
    ProviderRequest {
        references: vec![ReferenceImage {
            mime_type: "image/png".to_string(),
            data: vec![1, 2, 3],
        }],
        prompt: "change only the hair".to_string(),
        aspect_ratio: "3:4".to_string(),
    }
}

#[tokio::test]
async fn test_image_part_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "k1"))
        .and(body_partial_json(json!({
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": { "aspectRatio": "3:4" }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "here you go" },
                    { "inlineData": { "mimeType": "image/png", "data": STANDARD.encode([9u8, 8, 7]) } }
                ]},
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider(&server).generate("k1", &request()).await.unwrap();
    assert_eq!(response.first_image(), Some(&[9u8, 8, 7][..]));
    assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
}

#[tokio::test]
async fn test_429_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
        })))
        .mount(&server)
        .await;

    let err = provider(&server).generate("k1", &request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::RateLimited(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_bad_request_is_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT" }
        })))
        .mount(&server)
        .await;

    let err = provider(&server).generate("k1", &request()).await.unwrap_err();
    assert_eq!(err, ProviderError::Other("HTTP 400: API key not valid".to_string()));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_missing_candidates_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "finishReason": "IMAGE_SAFETY" }]
        })))
        .mount(&server)
        .await;

    let err = provider(&server).generate("k1", &request()).await.unwrap_err();
    assert_eq!(err, ProviderError::EmptyResponse("finishReason: IMAGE_SAFETY".to_string()));
}
