use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::tempdir;
use vibe_core::{AnalysisRequest, Backend, GatewayError, RequestOptions};
use vibe_exec::{CliExecutor, CliInvocation};
use vibe_gateway::{CacheStorage, Gateway, GatewayConfig};

const REVIEW: &str = r#"{"findings":[{"title":"Unbounded recursion","type":"performance","severity":"medium","line":3,"description":"No base case"}],"overallAssessment":"Needs work","recommendations":["Add a base case"]}"#;

#[derive(Default)]
struct CountingExecutor {
    calls: AtomicUsize,
}

#[async_trait]
impl CliExecutor for CountingExecutor {
    async fn execute(
        &self,
        _invocation: &CliInvocation,
        _prompt: &str,
        _timeout_ms: u64,
    ) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(REVIEW.to_string())
    }
}

fn file_config(dir: &std::path::Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.cache.directory = dir.join("cache");
    config.cache.storage = CacheStorage::File;
    config
}

fn request() -> AnalysisRequest {
    AnalysisRequest::new("fn f(n: u32) -> u32 { f(n) }").with_options(RequestOptions {
        auto_detect: Some(false),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_file_cache_survives_gateway_restart() {
    let temp_dir = tempdir().unwrap();
    let config = file_config(temp_dir.path());
    let executor = Arc::new(CountingExecutor::default());

    let first = Gateway::with_executor(&config, executor.clone()).unwrap();
    let result = first.analyze(Backend::Codex, request()).await.unwrap();
    assert!(result.success);
    assert!(!result.metadata.from_cache);
    drop(first);

    let second = Gateway::with_executor(&config, executor.clone()).unwrap();
    let cached = second.analyze(Backend::Codex, request()).await.unwrap();
    assert!(cached.metadata.from_cache);
    assert_eq!(cached.findings, result.findings);
    assert_ne!(cached.analysis_id, result.analysis_id);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 1);

    let stats = second.cache().stats().unwrap();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.repository.unwrap().total_entries, 1);
}

#[tokio::test]
async fn test_backends_share_store_not_entries() {
    let temp_dir = tempdir().unwrap();
    let config = file_config(temp_dir.path());
    let executor = Arc::new(CountingExecutor::default());
    let gateway = Gateway::with_executor(&config, executor.clone()).unwrap();

    gateway.analyze(Backend::Codex, request()).await.unwrap();
    let gemini = gateway.analyze(Backend::Gemini, request()).await.unwrap();

    assert!(!gemini.metadata.from_cache);
    assert_eq!(gemini.source, Backend::Gemini);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 2);

    let removed = gateway.cache().invalidate_by_source("gemini").unwrap();
    assert_eq!(removed, 1);
    let stats = gateway.cache().stats().unwrap().repository.unwrap();
    assert_eq!(stats.by_source.get("codex"), Some(&1));
}

#[tokio::test]
async fn test_no_cache_always_runs_backend() {
    let temp_dir = tempdir().unwrap();
    let mut config = file_config(temp_dir.path());
    config.cache.enabled = false;
    let executor = Arc::new(CountingExecutor::default());
    let gateway = Gateway::with_executor(&config, executor.clone()).unwrap();

    for _ in 0..2 {
        let result = gateway.analyze(Backend::Codex, request()).await.unwrap();
        assert!(!result.metadata.from_cache);
    }
    assert_eq!(executor.calls.load(Ordering::SeqCst), 2);
    assert!(!temp_dir.path().join("cache").exists());
}

#[tokio::test]
async fn test_configured_template_and_preset_apply() {
    let mut config = GatewayConfig::default();
    config.cache.storage = CacheStorage::Memory;
    config.gemini.template = Some("security-review".to_string());
    config.context.preset = Some("web-api".to_string());
    config.validate().unwrap();

    let gateway = Gateway::with_executor(&config, Arc::new(CountingExecutor::default())).unwrap();
    let result = gateway.analyze(Backend::Gemini, request()).await.unwrap();

    assert_eq!(result.metadata.template_used, "security-review");
    assert!(result.metadata.context.platform.is_some());

    let codex = gateway.analyze(Backend::Codex, request()).await.unwrap();
    assert_eq!(codex.metadata.template_used, "codex-default");
}

#[tokio::test]
async fn test_invalid_request_is_wrapped() {
    let config = GatewayConfig {
        cache: vibe_gateway::CacheConfig {
            storage: CacheStorage::Memory,
            ..Default::default()
        },
        ..Default::default()
    };
    let executor = Arc::new(CountingExecutor::default());
    let gateway = Gateway::with_executor(&config, executor.clone()).unwrap();

    let err = gateway
        .analyze(Backend::Codex, AnalysisRequest::new("   "))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("codex analysis"));
    assert!(matches!(err.cause, GatewayError::Validation(_)));
    assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
}
