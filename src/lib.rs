//! vibe-gateway: a cached, whitelisted front for CLI-based AI code review backends.

pub mod cli;
pub mod config;
pub mod gateway;

pub use config::{CacheConfig, CacheStorage, ConfigError, GatewayConfig};
pub use gateway::Gateway;
pub use vibe_core::{AnalysisError, AnalysisRequest, AnalysisResult, Backend, GatewayError};
