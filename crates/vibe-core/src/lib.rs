//! Core types for the vibe-gateway code analysis pipeline.
//!
//! This crate provides the types shared by every gateway component:
//! - Analysis requests and their validation
//! - Findings, severities and severity summaries
//! - Resolved context and context warnings
//! - Analysis results and metadata
//! - The gateway error taxonomy

mod backend;
mod context;
mod error;
mod finding;
mod request;
mod result;

pub use backend::Backend;
pub use context::{ContextOverrides, ContextWarning, ResolvedContext};
pub use error::{is_retryable, AnalysisError, GatewayError};
pub use finding::{Finding, Severity, SeverityFilter, SeveritySummary};
pub use request::{AnalysisRequest, RequestContext, RequestOptions, MAX_PROMPT_BYTES, MAX_TIMEOUT_MS};
pub use result::{AnalysisMetadata, AnalysisResult};
