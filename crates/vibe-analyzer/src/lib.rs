//! Code analysis services for vibe-gateway.
//!
//! Each backend gets one [`AnalysisService`] exposing `analyze_code` and
//! `health_check`. The service resolves context, consults the cache, runs the
//! analyzer CLI under retry and normalizes its output with [`ResponseParser`].

mod parser;
mod service;

pub use parser::{ResponseParser, MAX_PARSE_BYTES, RAW_OUTPUT_CAP};
pub use service::{AnalysisService, BackendConfig, HealthStatus};
