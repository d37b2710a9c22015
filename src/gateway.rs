//! Wires configuration into one analysis service per backend.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};
use vibe_analyzer::{AnalysisService, HealthStatus};
use vibe_cache::{CacheRepository, CacheService, FileRepository, MemoryRepository};
use vibe_core::{AnalysisError, AnalysisRequest, AnalysisResult, Backend};
use vibe_exec::{CliExecutor, ProcessExecutor};
use vibe_prompt::{ContextResolver, TemplateRegistry};

use crate::config::{CacheStorage, GatewayConfig};

/// The assembled gateway: a shared cache and context resolver, and one
/// service per backend.
pub struct Gateway {
    cache: Arc<CacheService>,
    codex: AnalysisService,
    gemini: AnalysisService,
}

impl Gateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        Self::with_executor(config, Arc::new(ProcessExecutor::new()))
    }

    /// Build the gateway around a custom executor.
    pub fn with_executor(config: &GatewayConfig, executor: Arc<dyn CliExecutor>) -> Result<Self> {
        let repository = build_repository(config)?;
        let cache = Arc::new(build_cache(config, repository));
        let context = Arc::new(ContextResolver::new(config.context.clone(), &config.warnings));
        let templates = TemplateRegistry::from_config(&config.templates);

        let build = |backend: Backend| {
            AnalysisService::new(backend, config.backend(backend).clone())
                .with_executor(executor.clone())
                .with_cache(cache.clone())
                .with_context_resolver(context.clone())
                .with_templates(templates.clone())
        };

        Ok(Self {
            codex: build(Backend::Codex),
            gemini: build(Backend::Gemini),
            cache,
        })
    }

    pub fn service(&self, backend: Backend) -> &AnalysisService {
        match backend {
            Backend::Codex => &self.codex,
            Backend::Gemini => &self.gemini,
        }
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    pub async fn analyze(
        &self,
        backend: Backend,
        request: AnalysisRequest,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.service(backend).analyze_code(request).await
    }

    pub fn health(&self, backend: Backend) -> HealthStatus {
        self.service(backend).health_check()
    }
}

fn build_repository(config: &GatewayConfig) -> Result<Arc<dyn CacheRepository>> {
    let cache = &config.cache;
    match cache.storage {
        CacheStorage::Memory => {
            debug!("Using in-memory cache (max {} entries)", cache.max_size);
            Ok(Arc::new(MemoryRepository::with_max_size(cache.max_size)))
        }
        // A disabled cache never touches the repository, so skip creating the directory.
        CacheStorage::File if !cache.enabled => Ok(Arc::new(MemoryRepository::new())),
        CacheStorage::File => {
            let repository = FileRepository::new(&cache.directory)
                .with_context(|| {
                    format!("Failed to create cache directory {}", cache.directory.display())
                })?
                .with_max_size(cache.max_size);
            debug!("Using file cache at {}", cache.directory.display());
            Ok(Arc::new(repository))
        }
    }
}

fn build_cache(config: &GatewayConfig, repository: Arc<dyn CacheRepository>) -> CacheService {
    if config.cache.enabled {
        info!(
            "Result cache enabled ({}, ttl {}ms)",
            config.cache.storage, config.cache.ttl_ms
        );
        CacheService::new(repository, Duration::from_millis(config.cache.ttl_ms))
    } else {
        info!("Result cache disabled");
        CacheService::disabled(repository)
    }
}
