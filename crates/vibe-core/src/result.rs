//! Analysis results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::Backend;
use crate::context::{ContextWarning, ResolvedContext};
use crate::finding::{Finding, SeverityFilter, SeveritySummary};

/// Diagnostics that ride along with a result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    pub duration_ms: u64,
    pub context: ResolvedContext,
    #[serde(default)]
    pub warnings: Vec<ContextWarning>,
    pub template_used: String,
    #[serde(default)]
    pub from_cache: bool,
}

/// Structured outcome of one analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub success: bool,
    /// Correlation id for logs; never part of cache identity.
    pub analysis_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source: Backend,
    pub summary: SeveritySummary,
    pub findings: Vec<Finding>,
    pub overall_assessment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: AnalysisMetadata,
    /// Size-capped analyzer output, only present when parsing failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

impl AnalysisResult {
    /// A successful result; the summary is derived from `findings`.
    pub fn success(
        analysis_id: Uuid,
        source: Backend,
        findings: Vec<Finding>,
        overall_assessment: String,
        recommendations: Option<Vec<String>>,
    ) -> Self {
        Self {
            success: true,
            analysis_id,
            timestamp: Utc::now(),
            source,
            summary: SeveritySummary::from_findings(&findings),
            findings,
            overall_assessment,
            recommendations,
            metadata: AnalysisMetadata::default(),
            raw_output: None,
        }
    }

    /// A non-throwing result for output that could not be parsed.
    pub fn raw_output_fallback(
        analysis_id: Uuid,
        source: Backend,
        reason: impl Into<String>,
        raw_output: String,
    ) -> Self {
        Self {
            success: false,
            analysis_id,
            timestamp: Utc::now(),
            source,
            summary: SeveritySummary::default(),
            findings: Vec::new(),
            overall_assessment: reason.into(),
            recommendations: None,
            metadata: AnalysisMetadata::default(),
            raw_output: Some(raw_output),
        }
    }

    /// Drop findings below the filter and re-derive the summary.
    pub fn apply_severity_filter(&mut self, filter: SeverityFilter) {
        if filter == SeverityFilter::All {
            return;
        }
        self.findings.retain(|f| filter.allows(f.severity));
        self.summary = SeveritySummary::from_findings(&self.findings);
    }
}
