//! Normalizes analyzer output into an [`AnalysisResult`].

use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;
use vibe_core::{AnalysisResult, Backend, Finding, GatewayError, SeverityFilter};

/// Output larger than this is never handed to the JSON parser.
pub const MAX_PARSE_BYTES: usize = 1024 * 1024;

/// Upper bound on `rawOutput` in a fallback result.
pub const RAW_OUTPUT_CAP: usize = 10_000;

/// How deep wrapper objects may nest before the output counts as unparsable.
const MAX_WRAPPER_DEPTH: usize = 2;

/// The target schema.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewPayload {
    findings: Vec<Finding>,
    overall_assessment: String,
    #[serde(default)]
    recommendations: Option<Vec<String>>,
}

/// `{ response, stats, error }` envelope some CLIs emit.
#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    response: serde_json::Value,
    #[serde(default)]
    stats: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

enum Decoded {
    Review(ReviewPayload),
    Unparsable(String),
}

/// Truncate to at most `cap` bytes without splitting a character.
fn truncate_on_char_boundary(text: &str, cap: usize) -> &str {
    if text.len() <= cap {
        return text;
    }
    let mut end = cap;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Extract the body of a Markdown code fence, preferring a `json` fence.
fn extract_fenced(text: &str) -> Option<&str> {
    let start = text
        .find("```json")
        .map(|i| i + "```json".len())
        .or_else(|| text.find("```").map(|i| i + 3))?;
    let remaining = &text[start..];
    let end = remaining.find("```")?;
    let body = remaining[..end].trim();
    (!body.is_empty()).then_some(body)
}

/// Strip a fence wrapping the whole string, if any.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        extract_fenced(trimmed).unwrap_or(trimmed)
    } else {
        trimmed
    }
}

fn validate(payload: &ReviewPayload) -> Result<(), GatewayError> {
    for (index, finding) in payload.findings.iter().enumerate() {
        if finding.title.trim().is_empty() {
            return Err(GatewayError::Parse(format!("finding {} has an empty title", index)));
        }
        if finding.line == Some(0) {
            return Err(GatewayError::Parse(format!(
                "finding {} ('{}') has line 0; lines are 1-based",
                index, finding.title
            )));
        }
    }
    Ok(())
}

/// Turns raw analyzer output into a result, degrading to a raw-output
/// fallback when the output cannot be understood.
#[derive(Debug, Clone, Copy)]
pub struct ResponseParser {
    source: Backend,
    max_parse_bytes: usize,
    raw_output_cap: usize,
}

impl ResponseParser {
    pub fn new(source: Backend) -> Self {
        Self {
            source,
            max_parse_bytes: MAX_PARSE_BYTES,
            raw_output_cap: RAW_OUTPUT_CAP,
        }
    }

    pub fn with_limits(mut self, max_parse_bytes: usize, raw_output_cap: usize) -> Self {
        self.max_parse_bytes = max_parse_bytes;
        self.raw_output_cap = raw_output_cap;
        self
    }

    /// Parse `raw` and apply the caller's severity filter.
    pub fn parse_filtered(
        &self,
        raw: &str,
        analysis_id: Uuid,
        filter: SeverityFilter,
    ) -> Result<AnalysisResult, GatewayError> {
        let mut result = self.parse(raw, analysis_id)?;
        result.apply_severity_filter(filter);
        Ok(result)
    }

    /// Parse `raw`.
    ///
    /// Only output that decodes into the target schema but violates it
    /// returns an error; everything else unreadable becomes a fallback.
    pub fn parse(&self, raw: &str, analysis_id: Uuid) -> Result<AnalysisResult, GatewayError> {
        if raw.len() > self.max_parse_bytes {
            warn!(
                "Analyzer output is {} bytes, over the {} byte parse limit",
                raw.len(),
                self.max_parse_bytes
            );
            return Ok(self.fallback(
                analysis_id,
                format!(
                    "Analyzer output exceeded the maximum parse size ({} bytes > {} bytes)",
                    raw.len(),
                    self.max_parse_bytes
                ),
                raw,
            ));
        }

        match self.decode(raw.trim(), 0)? {
            Decoded::Review(payload) => Ok(AnalysisResult::success(
                analysis_id,
                self.source,
                payload.findings,
                payload.overall_assessment,
                payload.recommendations,
            )),
            Decoded::Unparsable(reason) => {
                debug!("Falling back to raw output: {}", reason);
                Ok(self.fallback(analysis_id, reason, raw))
            }
        }
    }

    fn decode(&self, text: &str, depth: usize) -> Result<Decoded, GatewayError> {
        if text.is_empty() {
            return Ok(Decoded::Unparsable("Analyzer produced no output".to_string()));
        }

        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => self.decode_value(value, depth),
            Err(e) => match extract_fenced(text) {
                Some(body) if body != text => self.decode(body, depth + 1),
                _ => Ok(Decoded::Unparsable(format!("Analyzer output is not valid JSON: {}", e))),
            },
        }
    }

    fn decode_value(&self, value: serde_json::Value, depth: usize) -> Result<Decoded, GatewayError> {
        if depth > MAX_WRAPPER_DEPTH {
            return Ok(Decoded::Unparsable(
                "Analyzer output is nested too deeply".to_string(),
            ));
        }

        if let Ok(payload) = ReviewPayload::deserialize(&value) {
            validate(&payload)?;
            return Ok(Decoded::Review(payload));
        }

        let envelope = match ResponseEnvelope::deserialize(&value) {
            Ok(envelope) => envelope,
            Err(_) => {
                return Ok(Decoded::Unparsable(
                    "Analyzer output is JSON but matches no known response shape".to_string(),
                ));
            }
        };

        if let Some(stats) = &envelope.stats {
            debug!("Analyzer stats: {}", stats);
        }

        match envelope.response {
            serde_json::Value::String(text) => self.decode(strip_fences(&text), depth + 1),
            serde_json::Value::Null => Ok(Decoded::Unparsable(match envelope.error {
                Some(error) if !error.is_null() => format!("Analyzer reported an error: {}", error),
                _ => "Analyzer response was empty".to_string(),
            })),
            nested => self.decode_value(nested, depth + 1),
        }
    }

    fn fallback(&self, analysis_id: Uuid, reason: String, raw: &str) -> AnalysisResult {
        AnalysisResult::raw_output_fallback(
            analysis_id,
            self.source,
            reason,
            truncate_on_char_boundary(raw, self.raw_output_cap).to_string(),
        )
    }
}
