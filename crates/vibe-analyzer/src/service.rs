//! Per-backend analysis pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;
use vibe_cache::{text_digest, CacheKeyParams, CacheService, MemoryRepository};
use vibe_core::{AnalysisError, AnalysisRequest, AnalysisResult, Backend, GatewayError, SeverityFilter};
use vibe_exec::{CliConfig, CliExecutor, PathResolver, PathSource, ProcessExecutor};
use vibe_prompt::{
    ContextConfig, ContextDetector, ContextResolver, FileNameDetector, TemplateRegistry, WarningsConfig,
};

use crate::parser::ResponseParser;

/// Backend CLI settings plus its template override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(flatten)]
    pub cli: CliConfig,
    /// Template used when the request names none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl BackendConfig {
    pub fn for_backend(backend: Backend) -> Self {
        Self {
            cli: CliConfig::for_backend(backend),
            template: None,
        }
    }

    pub fn with_cli(mut self, cli: CliConfig) -> Self {
        self.cli = cli;
        self
    }
}

/// Outcome of [`AnalysisService::health_check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: String,
}

/// The single entry point for one backend.
///
/// Composes context resolution, fingerprinting, the cache, path validation,
/// the retried subprocess call and response parsing.
pub struct AnalysisService {
    backend: Backend,
    config: BackendConfig,
    resolver: Arc<PathResolver>,
    executor: Arc<dyn CliExecutor>,
    cache: Arc<CacheService>,
    context: Arc<ContextResolver>,
    templates: Arc<TemplateRegistry>,
    detector: Arc<dyn ContextDetector>,
    parser: ResponseParser,
    working_dir: PathBuf,
}

impl AnalysisService {
    /// A service with the real process executor and caching disabled.
    pub fn new(backend: Backend, config: BackendConfig) -> Self {
        let mut templates = TemplateRegistry::builtin();
        if let Some(id) = &config.template {
            templates.set_backend_default(backend, id.clone());
        }

        let working_dir = config
            .cli
            .working_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            backend,
            resolver: Arc::new(PathResolver::new(backend)),
            executor: Arc::new(ProcessExecutor::new()),
            cache: Arc::new(CacheService::disabled(Arc::new(MemoryRepository::new()))),
            context: Arc::new(ContextResolver::new(ContextConfig::default(), &WarningsConfig::default())),
            templates: Arc::new(templates),
            detector: Arc::new(FileNameDetector),
            parser: ResponseParser::new(backend),
            working_dir,
            config,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<PathResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn CliExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_cache(mut self, cache: Arc<CacheService>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_context_resolver(mut self, context: Arc<ContextResolver>) -> Self {
        self.context = context;
        self
    }

    /// Replace the template registry. The backend's configured template is
    /// applied on top of it.
    pub fn with_templates(mut self, mut templates: TemplateRegistry) -> Self {
        if let Some(id) = &self.config.template {
            templates.set_backend_default(self.backend, id.clone());
        }
        self.templates = Arc::new(templates);
        self
    }

    pub fn with_detector(mut self, detector: Arc<dyn ContextDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_parser(mut self, parser: ResponseParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    /// Analyze one request.
    ///
    /// Every failure is wrapped once in an [`AnalysisError`] carrying this
    /// request's analysis id.
    pub async fn analyze_code(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let analysis_id = Uuid::new_v4();
        info!("Starting {} analysis {}", self.backend, analysis_id);

        self.run(&request, analysis_id).await.map_err(|cause| {
            error!(
                "{} analysis {} failed ({}): {}",
                self.backend,
                analysis_id,
                cause.kind(),
                cause
            );
            AnalysisError::new(self.backend, analysis_id, cause)
        })
    }

    async fn run(&self, request: &AnalysisRequest, analysis_id: Uuid) -> Result<AnalysisResult, GatewayError> {
        let started = Instant::now();

        request.validate()?;
        let options = request.options();
        let template = self.templates.select(options.template.as_deref(), self.backend)?;
        self.context.check_preset(options.preset.as_deref())?;

        let detected = if self.context.auto_detect_enabled(options.auto_detect) {
            let file_name = request.file_name();
            Some(self.detector.detect(
                &request.prompt,
                file_name.as_deref().and_then(Path::to_str),
                &self.working_dir,
            ))
        } else {
            None
        };

        let resolution = self
            .context
            .resolve(&request.context(), options.preset.as_deref(), detected.as_ref())?;
        let context = &resolution.context;
        let prompt = template.render(&request.prompt, context);

        let severity = options.severity.unwrap_or_default();
        let params = CacheKeyParams {
            language: context.language.clone(),
            framework: context.framework.clone(),
            platform: context.platform.clone(),
            threat_model: context.threat_model.clone(),
            file_name: context.file_name.clone(),
            scope: context.scope.clone(),
            focus: context.focus.clone(),
            severity: Some(severity.as_str().to_string()),
            template: Some(template.id.clone()),
            template_digest: Some(text_digest(&template.text)),
            model: self.config.cli.model.clone(),
            reasoning_effort: self.config.cli.reasoning_effort.clone(),
            args: self.config.cli.args.clone(),
            ..CacheKeyParams::new(self.backend.id(), request.prompt.clone())
        };

        let requested_cli = options.cli_path.as_deref();
        let timeout_ms = options.timeout.unwrap_or(self.config.cli.timeout_ms);

        let outcome = self
            .cache
            .get_or_set_if(
                &params,
                || self.execute(&prompt, requested_cli, timeout_ms, analysis_id, severity),
                None,
                |result: &AnalysisResult| result.success,
            )
            .await?;

        let mut result = outcome.value;
        if outcome.from_cache {
            result.analysis_id = analysis_id;
        }
        result.metadata.from_cache = outcome.from_cache;
        result.metadata.duration_ms = started.elapsed().as_millis() as u64;
        result.metadata.context = resolution.context;
        result.metadata.warnings = resolution.warnings;
        result.metadata.template_used = template.id;

        info!(
            "{} analysis {} finished: success={} findings={} from_cache={}",
            self.backend,
            analysis_id,
            result.success,
            result.summary.total_findings,
            result.metadata.from_cache
        );
        Ok(result)
    }

    /// Validate the CLI path, run the analyzer under retry and parse.
    async fn execute(
        &self,
        prompt: &str,
        requested_cli: Option<&str>,
        timeout_ms: u64,
        analysis_id: Uuid,
        severity: SeverityFilter,
    ) -> Result<AnalysisResult, GatewayError> {
        // Checked once, outside the retry loop.
        let configured = &self.config.cli.cli_path;
        let resolved = match requested_cli {
            Some(requested) => self.resolver.resolve_requested(requested, configured)?,
            None => self.resolver.resolve(configured)?,
        };
        debug!(
            "Using {} CLI at {} ({:?})",
            self.backend,
            resolved.path.display(),
            resolved.source
        );

        let invocation = self.config.cli.invocation(self.backend, resolved.path);
        let label = format!("{} analysis {}", self.backend, analysis_id);
        let output = self
            .config
            .cli
            .retry_policy()
            .execute(&label, || self.executor.execute(&invocation, prompt, timeout_ms))
            .await?;

        self.parser.parse_filtered(&output, analysis_id, severity)
    }

    /// Detect the CLI without running an analysis.
    pub fn health_check(&self) -> HealthStatus {
        match self.resolver.resolve(&self.config.cli.cli_path) {
            Ok(resolved) if resolved.exists => HealthStatus {
                healthy: true,
                message: format!(
                    "{} CLI available at {} (source: {})",
                    self.backend,
                    resolved.path.display(),
                    source_label(resolved.source)
                ),
            },
            Ok(resolved) => HealthStatus {
                healthy: false,
                message: format!(
                    "{} CLI not found at {}; install it or set {}",
                    self.backend,
                    resolved.path.display(),
                    self.backend.cli_path_env()
                ),
            },
            Err(e) => HealthStatus {
                healthy: false,
                message: e.to_string(),
            },
        }
    }
}

fn source_label(source: PathSource) -> &'static str {
    match source {
        PathSource::Configured => "configured",
        PathSource::Detected => "detected",
        PathSource::Env => "env",
        PathSource::SystemPath => "system-path",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vibe_exec::CliInvocation;

    struct ScriptedExecutor {
        output: String,
        calls: AtomicUsize,
    }

    impl ScriptedExecutor {
        fn new(output: &str) -> Arc<Self> {
            Arc::new(Self {
                output: output.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CliExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            _invocation: &CliInvocation,
            _prompt: &str,
            _timeout_ms: u64,
        ) -> Result<String, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.output.clone())
        }
    }

    fn service(executor: Arc<ScriptedExecutor>) -> AnalysisService {
        let config = BackendConfig::for_backend(Backend::Gemini)
            .with_cli(CliConfig::default().with_cli_path("gemini").with_retry(1, 0));
        AnalysisService::new(Backend::Gemini, config).with_executor(executor)
    }

    #[tokio::test]
    async fn test_metadata_is_populated() {
        let executor = ScriptedExecutor::new(r#"{"findings":[],"overallAssessment":"clean"}"#);
        let service = service(executor.clone());

        let request = AnalysisRequest::new("fn main() {}").with_context(vibe_core::RequestContext {
            file_name: Some("main.rs".to_string()),
            ..Default::default()
        });
        let result = service.analyze_code(request).await.unwrap();

        assert!(result.success);
        assert_eq!(result.source, Backend::Gemini);
        assert_eq!(result.metadata.template_used, "gemini-default");
        assert_eq!(result.metadata.context.language.as_deref(), Some("rust"));
        assert_eq!(result.metadata.context.detected_signals, vec!["file-extension:rs"]);
        assert!(!result.metadata.from_cache);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validation_error_before_any_io() {
        let executor = ScriptedExecutor::new("{}");
        let service = service(executor.clone());

        let err = service.analyze_code(AnalysisRequest::new("   ")).await.unwrap_err();
        assert!(err.cause.is_validation());
        assert_eq!(err.backend, Backend::Gemini);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_template_rejected() {
        let executor = ScriptedExecutor::new("{}");
        let service = service(executor.clone());

        let request = AnalysisRequest::new("x").with_options(vibe_core::RequestOptions {
            template: Some("missing".to_string()),
            ..Default::default()
        });
        let err = service.analyze_code(request).await.unwrap_err();
        assert!(err.cause.is_validation());
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unparsable_output_is_a_result() {
        let executor = ScriptedExecutor::new("Sorry, I can't help with that.");
        let service = service(executor);

        let result = service.analyze_code(AnalysisRequest::new("x")).await.unwrap();
        assert!(!result.success);
        assert!(result.raw_output.is_some());
    }

    #[test]
    fn test_backend_config_flattens_cli_fields() {
        let config: BackendConfig = serde_json::from_str(
            r#"{"cli_path": "codex", "timeout_ms": 0, "template": "security-review"}"#,
        )
        .unwrap();
        assert_eq!(config.cli.cli_path, "codex");
        assert_eq!(config.cli.timeout_ms, 0);
        assert_eq!(config.cli.retry_attempts, 3);
        assert_eq!(config.template.as_deref(), Some("security-review"));
    }

    #[test]
    fn test_health_check_rejects_untrusted_path() {
        let config = BackendConfig::for_backend(Backend::Codex)
            .with_cli(CliConfig::default().with_cli_path("/tmp/attacker/tool"));
        let resolver = Arc::new(PathResolver::with_known_locations(Backend::Codex, vec![], None));
        let service = AnalysisService::new(Backend::Codex, config).with_resolver(resolver);

        let status = service.health_check();
        assert!(!status.healthy);
        assert!(status.message.contains("/tmp/attacker/tool"));
    }
}
