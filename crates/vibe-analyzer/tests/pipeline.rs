//! End-to-end behaviour of the analysis pipeline with mocked collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vibe_analyzer::{AnalysisService, BackendConfig};
use vibe_cache::{
    CacheEntry, CacheError, CacheRepository, CacheService, MemoryRepository, RepositoryStats,
};
use vibe_core::{AnalysisRequest, Backend, GatewayError, RequestContext, RequestOptions, SeverityFilter};
use vibe_exec::{CliConfig, CliExecutor, CliInvocation, PathResolver};
use vibe_prompt::TemplateRegistry;

const REVIEW: &str = r#"{"findings":[{"title":"X","type":"style","severity":"low","line":null,"description":"d"}],"overallAssessment":"ok","recommendations":[]}"#;

struct MockExecutor {
    responses: Vec<Result<String, GatewayError>>,
    calls: AtomicUsize,
    prompts: std::sync::Mutex<Vec<String>>,
}

impl MockExecutor {
    fn always(output: &str) -> Arc<Self> {
        Self::sequence(vec![Ok(output.to_string())])
    }

    /// Returns `responses` in order, repeating the last one.
    fn sequence(responses: Vec<Result<String, GatewayError>>) -> Arc<Self> {
        Arc::new(Self {
            responses,
            calls: AtomicUsize::new(0),
            prompts: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn clone_result(result: &Result<String, GatewayError>) -> Result<String, GatewayError> {
    match result {
        Ok(s) => Ok(s.clone()),
        Err(GatewayError::Timeout { timeout_ms }) => Err(GatewayError::Timeout {
            timeout_ms: *timeout_ms,
        }),
        Err(GatewayError::CliExecution {
            exit_code,
            stdout,
            stderr,
        }) => Err(GatewayError::CliExecution {
            exit_code: *exit_code,
            stdout: stdout.clone(),
            stderr: stderr.clone(),
        }),
        Err(other) => Err(GatewayError::Parse(other.to_string())),
    }
}

#[async_trait]
impl CliExecutor for MockExecutor {
    async fn execute(
        &self,
        invocation: &CliInvocation,
        prompt: &str,
        _timeout_ms: u64,
    ) -> Result<String, GatewayError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(
            !invocation.args.iter().any(|arg| arg.contains(prompt)),
            "prompt leaked into argv"
        );
        self.prompts.lock().unwrap().push(prompt.to_string());
        let index = call.min(self.responses.len() - 1);
        clone_result(&self.responses[index])
    }
}

/// Counts repository traffic; optionally fails every write.
#[derive(Default)]
struct CountingRepository {
    inner: MemoryRepository,
    gets: AtomicUsize,
    sets: AtomicUsize,
    fail_writes: bool,
}

impl CacheRepository for CountingRepository {
    fn get(&self, key: &str) -> vibe_cache::Result<Option<CacheEntry>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }

    fn set(&self, key: &str, source: &str, value: serde_json::Value, ttl: Duration) -> vibe_cache::Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(CacheError::Io(std::io::Error::other("cache offline")));
        }
        self.inner.set(key, source, value, ttl)
    }

    fn delete(&self, key: &str) -> vibe_cache::Result<bool> {
        self.inner.delete(key)
    }

    fn clear_by_source(&self, source: &str) -> vibe_cache::Result<usize> {
        self.inner.clear_by_source(source)
    }

    fn clear(&self) -> vibe_cache::Result<usize> {
        self.inner.clear()
    }

    fn delete_expired(&self) -> vibe_cache::Result<usize> {
        self.inner.delete_expired()
    }

    fn size(&self) -> vibe_cache::Result<usize> {
        self.inner.size()
    }

    fn stats(&self) -> vibe_cache::Result<RepositoryStats> {
        self.inner.stats()
    }
}

fn backend_config(backend: Backend, cli_path: &str) -> BackendConfig {
    BackendConfig::for_backend(backend).with_cli(
        CliConfig::for_backend(backend)
            .with_cli_path(cli_path)
            .with_retry(3, 0),
    )
}

fn service(
    backend: Backend,
    executor: Arc<MockExecutor>,
    repository: Arc<dyn CacheRepository>,
    enabled: bool,
) -> AnalysisService {
    let cache = if enabled {
        CacheService::new(repository, Duration::from_secs(3600))
    } else {
        CacheService::disabled(repository)
    };
    AnalysisService::new(backend, backend_config(backend, "tool"))
        .with_resolver(Arc::new(PathResolver::with_known_locations(backend, vec![], None)))
        .with_executor(executor)
        .with_cache(Arc::new(cache))
}

fn typescript_request() -> AnalysisRequest {
    AnalysisRequest::new("review this").with_context(RequestContext {
        language: Some("TypeScript".to_string()),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_end_to_end_second_request_served_from_cache() {
    let executor = MockExecutor::always(REVIEW);
    let service = service(Backend::Codex, executor.clone(), Arc::new(MemoryRepository::new()), true);

    let first = service.analyze_code(typescript_request()).await.unwrap();
    assert!(first.success);
    assert_eq!(first.summary.total_findings, 1);
    assert_eq!(first.summary.critical, 0);
    assert_eq!(first.summary.high, 0);
    assert_eq!(first.summary.medium, 0);
    assert_eq!(first.summary.low, 1);
    assert!(!first.metadata.from_cache);

    let second = service.analyze_code(typescript_request()).await.unwrap();
    assert!(second.metadata.from_cache);
    assert_eq!(second.findings, first.findings);
    assert_ne!(second.analysis_id, first.analysis_id);
    assert_eq!(executor.calls(), 1);

    let stats = service.cache().stats().unwrap();
    assert_eq!((stats.hits, stats.misses), (1, 1));
}

#[tokio::test]
async fn test_cache_key_ignores_context_casing() {
    let executor = MockExecutor::always(REVIEW);
    let service = service(Backend::Codex, executor.clone(), Arc::new(MemoryRepository::new()), true);

    service.analyze_code(typescript_request()).await.unwrap();
    let lower = AnalysisRequest::new("review this").with_context(RequestContext {
        language: Some("typescript".to_string()),
        ..Default::default()
    });
    let result = service.analyze_code(lower).await.unwrap();

    assert!(result.metadata.from_cache);
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn test_backends_never_share_entries() {
    let repository: Arc<dyn CacheRepository> = Arc::new(MemoryRepository::new());
    let codex_exec = MockExecutor::always(REVIEW);
    let gemini_exec = MockExecutor::always(REVIEW);
    let codex = service(Backend::Codex, codex_exec.clone(), repository.clone(), true);
    let gemini = service(Backend::Gemini, gemini_exec.clone(), repository.clone(), true);

    codex.analyze_code(typescript_request()).await.unwrap();
    let result = gemini.analyze_code(typescript_request()).await.unwrap();

    assert!(!result.metadata.from_cache);
    assert_eq!(result.source, Backend::Gemini);
    assert_eq!(gemini_exec.calls(), 1);

    let stats = repository.stats().unwrap();
    assert_eq!(stats.by_source["codex"], 1);
    assert_eq!(stats.by_source["gemini"], 1);
}

#[tokio::test]
async fn test_disabled_cache_never_touches_repository() {
    let executor = MockExecutor::always(REVIEW);
    let repository = Arc::new(CountingRepository::default());
    let service = service(Backend::Codex, executor.clone(), repository.clone(), false);

    for _ in 0..2 {
        let result = service.analyze_code(typescript_request()).await.unwrap();
        assert!(!result.metadata.from_cache);
    }

    assert_eq!(executor.calls(), 2);
    assert_eq!(repository.gets.load(Ordering::SeqCst), 0);
    assert_eq!(repository.sets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_cache_write_still_returns_result() {
    let executor = MockExecutor::always(REVIEW);
    let repository = Arc::new(CountingRepository {
        fail_writes: true,
        ..Default::default()
    });
    let service = service(Backend::Codex, executor, repository.clone(), true);

    let result = service.analyze_code(typescript_request()).await.unwrap();

    assert!(result.success);
    assert!(!result.metadata.from_cache);
    assert_eq!(repository.sets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fallback_results_are_not_cached() {
    let executor = MockExecutor::always("not json at all");
    let repository = Arc::new(CountingRepository::default());
    let service = service(Backend::Gemini, executor.clone(), repository.clone(), true);

    for _ in 0..2 {
        let result = service.analyze_code(typescript_request()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.raw_output.as_deref(), Some("not json at all"));
    }

    assert_eq!(executor.calls(), 2);
    assert_eq!(repository.sets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_untrusted_path_never_reaches_executor() {
    let executor = MockExecutor::always(REVIEW);
    let service = AnalysisService::new(Backend::Codex, backend_config(Backend::Codex, "/tmp/attacker/tool"))
        .with_resolver(Arc::new(PathResolver::with_known_locations(Backend::Codex, vec![], None)))
        .with_executor(executor.clone());

    let err = service.analyze_code(typescript_request()).await.unwrap_err();

    assert!(err.cause.is_security());
    assert_eq!(err.backend, Backend::Codex);
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_request_cli_path_is_validated_too() {
    let executor = MockExecutor::always(REVIEW);
    let service = service(Backend::Codex, executor.clone(), Arc::new(MemoryRepository::new()), false);

    let request = typescript_request().with_options(RequestOptions {
        cli_path: Some("/tmp/attacker/tool".to_string()),
        ..Default::default()
    });
    let err = service.analyze_code(request).await.unwrap_err();

    assert!(err.cause.is_security());
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let executor = MockExecutor::sequence(vec![
        Err(GatewayError::Timeout { timeout_ms: 10 }),
        Err(GatewayError::CliExecution {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "rate limited".to_string(),
        }),
        Ok(REVIEW.to_string()),
    ]);
    let service = service(Backend::Codex, executor.clone(), Arc::new(MemoryRepository::new()), false);

    let result = service.analyze_code(typescript_request()).await.unwrap();

    assert!(result.success);
    assert_eq!(executor.calls(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_surface_wrapped_cause() {
    let executor = MockExecutor::sequence(vec![Err(GatewayError::CliExecution {
        exit_code: Some(2),
        stdout: String::new(),
        stderr: "auth required".to_string(),
    })]);
    let service = service(Backend::Gemini, executor.clone(), Arc::new(MemoryRepository::new()), true);

    let err = service.analyze_code(typescript_request()).await.unwrap_err();

    assert_eq!(executor.calls(), 3);
    assert!(matches!(err.cause, GatewayError::CliExecution { exit_code: Some(2), .. }));
    assert!(err.to_string().contains(&err.analysis_id.to_string()));
    assert!(err.to_string().starts_with("gemini analysis"));
}

#[tokio::test]
async fn test_severity_filter_and_prompt_rendering() {
    let review = r#"{"findings":[
        {"title":"a","type":"security","severity":"critical","line":3,"description":""},
        {"title":"b","type":"style","severity":"low","line":9,"description":""}
    ],"overallAssessment":"needs work"}"#;
    let executor = MockExecutor::always(review);
    let service = service(Backend::Codex, executor.clone(), Arc::new(MemoryRepository::new()), false);

    let request = typescript_request().with_options(RequestOptions {
        severity: Some(SeverityFilter::High),
        template: Some("security-review".to_string()),
        ..Default::default()
    });
    let result = service.analyze_code(request).await.unwrap();

    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.summary.total_findings, 1);
    assert_eq!(result.summary.critical, 1);
    assert_eq!(result.metadata.template_used, "security-review");

    let prompts = executor.prompts.lock().unwrap();
    assert!(prompts[0].contains("review this"));
    assert!(prompts[0].contains("- **Language**: TypeScript"));
}

#[test]
fn test_unknown_template_rejected_before_any_io() {
    let executor = MockExecutor::always(REVIEW);
    let repository = Arc::new(CountingRepository::default());
    let service = service(Backend::Codex, executor.clone(), repository.clone(), true);

    let request = typescript_request().with_options(RequestOptions {
        template: Some("no-such-template".to_string()),
        ..Default::default()
    });
    let err = tokio_test::block_on(service.analyze_code(request)).unwrap_err();

    assert!(err.cause.is_validation());
    assert_eq!(executor.calls(), 0);
    assert_eq!(repository.gets.load(Ordering::SeqCst), 0);
}

fn shared_cache_service(
    config: BackendConfig,
    executor: Arc<MockExecutor>,
    cache: Arc<CacheService>,
) -> AnalysisService {
    AnalysisService::new(Backend::Codex, config)
        .with_resolver(Arc::new(PathResolver::with_known_locations(Backend::Codex, vec![], None)))
        .with_executor(executor)
        .with_cache(cache)
}

#[tokio::test]
async fn test_reasoning_effort_partitions_cache() {
    let cache = Arc::new(CacheService::new(Arc::new(MemoryRepository::new()), Duration::from_secs(3600)));
    let executor = MockExecutor::always(REVIEW);

    let mut low = backend_config(Backend::Codex, "tool");
    low.cli.reasoning_effort = Some("low".to_string());
    let mut high = low.clone();
    high.cli.reasoning_effort = Some("high".to_string());

    let low = shared_cache_service(low, executor.clone(), cache.clone());
    let high = shared_cache_service(high, executor.clone(), cache.clone());

    assert!(!low.analyze_code(typescript_request()).await.unwrap().metadata.from_cache);
    assert!(!high.analyze_code(typescript_request()).await.unwrap().metadata.from_cache);
    assert_eq!(executor.calls(), 2);

    // same settings still hit
    assert!(high.analyze_code(typescript_request()).await.unwrap().metadata.from_cache);
    assert_eq!(executor.calls(), 2);
}

#[tokio::test]
async fn test_edited_template_text_misses() {
    let cache = Arc::new(CacheService::new(Arc::new(MemoryRepository::new()), Duration::from_secs(3600)));
    let executor = MockExecutor::always(REVIEW);
    let config = BackendConfig {
        template: Some("house".to_string()),
        ..backend_config(Backend::Codex, "tool")
    };

    let mut original = TemplateRegistry::builtin();
    original.register("house", "Review:\n{prompt}\n{formatInstructions}");
    let mut edited = TemplateRegistry::builtin();
    edited.register("house", "Review strictly:\n{prompt}\n{formatInstructions}");

    let before = shared_cache_service(config.clone(), executor.clone(), cache.clone()).with_templates(original);
    let after = shared_cache_service(config, executor.clone(), cache.clone()).with_templates(edited);

    before.analyze_code(typescript_request()).await.unwrap();
    let result = after.analyze_code(typescript_request()).await.unwrap();

    assert_eq!(result.metadata.template_used, "house");
    assert!(!result.metadata.from_cache);
    assert_eq!(executor.calls(), 2);
}

#[tokio::test]
async fn test_configured_args_partition_cache() {
    let cache = Arc::new(CacheService::new(Arc::new(MemoryRepository::new()), Duration::from_secs(3600)));
    let executor = MockExecutor::always(REVIEW);

    let plain = backend_config(Backend::Codex, "tool");
    let mut sandboxed = plain.clone();
    sandboxed.cli.args.push("--sandbox=read-only".to_string());

    shared_cache_service(plain, executor.clone(), cache.clone())
        .analyze_code(typescript_request())
        .await
        .unwrap();
    let result = shared_cache_service(sandboxed, executor.clone(), cache.clone())
        .analyze_code(typescript_request())
        .await
        .unwrap();

    assert!(!result.metadata.from_cache);
    assert_eq!(executor.calls(), 2);
}

#[tokio::test]
async fn test_request_cannot_pick_arbitrary_program() {
    let executor = MockExecutor::always(REVIEW);
    let service = service(Backend::Codex, executor.clone(), Arc::new(MemoryRepository::new()), false);

    let request = typescript_request().with_options(RequestOptions {
        cli_path: Some("bash".to_string()),
        ..Default::default()
    });
    let err = service.analyze_code(request).await.unwrap_err();
    assert!(err.cause.is_security());
    assert_eq!(executor.calls(), 0);

    // the configured name stays usable per request
    let request = typescript_request().with_options(RequestOptions {
        cli_path: Some("tool".to_string()),
        ..Default::default()
    });
    assert!(service.analyze_code(request).await.unwrap().success);
    assert_eq!(executor.calls(), 1);
}
