//! Functional tests for the rate-limited generation client

#[path = "../common/mod.rs"]
mod common;

use common::{image_response, text_only_response, FakeProvider, PNG};
use std::sync::Arc;
use std::time::Duration;
use styleset_agent::backend::ProviderError;
use styleset_agent::client::{BackoffPolicy, GenerationClient, GenerationError, GenerationInput, Unthrottled};
use styleset_agent::storage::{content_hash, LocalStorage, ObjectStorage};

fn client(provider: Arc<FakeProvider>, storage: Arc<LocalStorage>, keys: &[&str], retries: u32) -> GenerationClient {
    GenerationClient::new(
        provider,
        storage,
        Arc::new(Unthrottled),
        keys.iter().map(|k| k.to_string()).collect(),
        BackoffPolicy::new(retries, Duration::ZERO, Duration::ZERO),
    )
}

fn input(reference_paths: Vec<String>) -> GenerationInput {
    GenerationInput {
        reference_paths,
        prompt: "keep everything, change the hair".to_string(),
        negative_prompt: Some("different person".to_string()),
        aspect_ratio: "3:4".to_string(),
    }
}

#[tokio::test]
async fn test_success_uploads_and_hashes() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(LocalStorage::new(dir.path(), "http://assets.test"));
    storage.upload("refs/a.png", PNG, "image/png").await.unwrap();
    let provider = Arc::new(FakeProvider::succeeding());

    let image = client(provider.clone(), storage.clone(), &["key-aaaa"], 2)
        .generate(&input(vec!["refs/a.png".to_string()]), "out/000.png")
        .await
        .unwrap();

    assert_eq!(image.hash, content_hash(PNG));
    assert_eq!(image.url, "http://assets.test/out/000.png");
    assert_eq!(storage.download("out/000.png").await.unwrap(), PNG);
    assert_eq!(provider.calls(), 1);

    let sent = provider.prompts.lock()[0].clone();
    assert!(sent.ends_with("IMPORTANT: DO NOT include any of the following: different person"));
}

#[tokio::test]
async fn test_rate_limit_retried_on_same_key() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(LocalStorage::new(dir.path(), "http://assets.test"));
    let provider = Arc::new(
        FakeProvider::succeeding()
            .then(Err(ProviderError::RateLimited("HTTP 429".to_string())))
            .then(Ok(text_only_response())),
    );

    let result = client(provider.clone(), storage, &["key-aaaa"], 2)
        .generate(&input(Vec::new()), "out/001.png")
        .await;

    assert!(result.is_ok());
    assert_eq!(provider.calls(), 3);
    assert!(provider.keys.lock().iter().all(|k| k == "key-aaaa"));
}

#[tokio::test]
async fn test_retry_budget_exhaustion_reports_last_error() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(LocalStorage::new(dir.path(), "http://assets.test"));
    let provider = Arc::new(FakeProvider::failing(ProviderError::RateLimited(
        "HTTP 429: quota".to_string(),
    )));

    let err = client(provider.clone(), storage, &["key-aaaa"], 2)
        .generate(&input(Vec::new()), "out/002.png")
        .await
        .unwrap_err();

    assert_eq!(provider.calls(), 3);
    match err {
        GenerationError::Exhausted(message) => assert!(message.contains("quota")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_other_errors_move_to_next_key_without_retry() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(LocalStorage::new(dir.path(), "http://assets.test"));
    let provider = Arc::new(FakeProvider::failing(ProviderError::Other("HTTP 500".to_string())));

    let result = client(provider.clone(), storage, &["key-aaaa", "key-bbbb"], 3)
        .generate(&input(Vec::new()), "out/003.png")
        .await;

    assert!(result.is_err());
    assert_eq!(provider.calls(), 2);
    let mut keys = provider.keys.lock().clone();
    keys.sort();
    assert_eq!(keys, vec!["key-aaaa", "key-bbbb"]);
}

#[tokio::test]
async fn test_rejected_key_falls_through_to_working_key() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(LocalStorage::new(dir.path(), "http://assets.test"));
    let provider = Arc::new(FakeProvider::succeeding().rejecting_key("key-dead"));

    for i in 0..5 {
        let path = format!("out/rot-{}.png", i);
        let result = client(provider.clone(), storage.clone(), &["key-dead", "key-live"], 0)
            .generate(&input(Vec::new()), &path)
            .await;
        assert!(result.is_ok());
    }
    assert!(provider.calls() >= 5 && provider.calls() <= 10);
}

#[tokio::test]
async fn test_missing_references_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(LocalStorage::new(dir.path(), "http://assets.test"));
    let provider = Arc::new(FakeProvider::succeeding().then(Ok(image_response())));

    let result = client(provider.clone(), storage, &["key-aaaa"], 0)
        .generate(&input(vec!["refs/missing.png".to_string()]), "out/004.png")
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_no_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(LocalStorage::new(dir.path(), "http://assets.test"));
    let provider = Arc::new(FakeProvider::succeeding());

    let err = client(provider.clone(), storage, &["  "], 1)
        .generate(&input(Vec::new()), "out/005.png")
        .await
        .unwrap_err();

    assert_eq!(err, GenerationError::NoCredentials);
    assert_eq!(provider.calls(), 0);
}
