//! Findings, severities and severity summaries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize a string that may be null as an empty string.
fn null_to_empty_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// Severity of a single finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

// Backends are inconsistent about casing ("HIGH", "High"), so accept any.
impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Minimum-severity filter requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityFilter {
    /// Critical and high only.
    High,
    /// Critical, high and medium.
    Medium,
    /// No filtering.
    #[default]
    All,
}

impl SeverityFilter {
    /// Whether a finding of the given severity survives the filter.
    pub fn allows(&self, severity: Severity) -> bool {
        match self {
            SeverityFilter::High => severity >= Severity::High,
            SeverityFilter::Medium => severity >= Severity::Medium,
            SeverityFilter::All => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityFilter::High => "high",
            SeverityFilter::Medium => "medium",
            SeverityFilter::All => "all",
        }
    }
}

impl FromStr for SeverityFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(SeverityFilter::High),
            "medium" => Ok(SeverityFilter::Medium),
            "all" | "low" => Ok(SeverityFilter::All),
            other => Err(format!(
                "unknown severity filter '{}' (valid values: high, medium, all)",
                other
            )),
        }
    }
}

/// One reported issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,

    /// Category such as security, style or performance.
    #[serde(rename = "type")]
    pub kind: String,

    pub severity: Severity,

    #[serde(default)]
    pub line: Option<u32>,

    #[serde(default, deserialize_with = "null_to_empty_string")]
    pub description: String,
}

/// Finding counts per severity bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeveritySummary {
    pub total_findings: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeveritySummary {
    /// Count findings per severity.
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Self {
            total_findings: findings.len(),
            ..Default::default()
        };
        for finding in findings {
            match finding.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> Finding {
        Finding {
            title: "t".to_string(),
            kind: "security".to_string(),
            severity,
            line: None,
            description: String::new(),
        }
    }

    #[test]
    fn test_severity_deserialization_is_case_insensitive() {
        let s: Severity = serde_json::from_str("\"HIGH\"").unwrap();
        assert_eq!(s, Severity::High);
        assert!(serde_json::from_str::<Severity>("\"urgent\"").is_err());
    }

    #[test]
    fn test_severity_filter_allows() {
        assert!(SeverityFilter::High.allows(Severity::Critical));
        assert!(SeverityFilter::High.allows(Severity::High));
        assert!(!SeverityFilter::High.allows(Severity::Medium));
        assert!(SeverityFilter::Medium.allows(Severity::Medium));
        assert!(!SeverityFilter::Medium.allows(Severity::Low));
        assert!(SeverityFilter::All.allows(Severity::Low));
    }

    #[test]
    fn test_summary_counts() {
        let findings = vec![
            finding(Severity::Critical),
            finding(Severity::Low),
            finding(Severity::Low),
        ];
        let summary = SeveritySummary::from_findings(&findings);
        assert_eq!(summary.total_findings, 3);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.low, 2);
        assert_eq!(summary.high + summary.medium, 0);
    }

    #[test]
    fn test_finding_with_null_line_and_description() {
        let json = r#"{"title":"X","type":"style","severity":"low","line":null,"description":null}"#;
        let f: Finding = serde_json::from_str(json).unwrap();
        assert_eq!(f.line, None);
        assert_eq!(f.description, "");
        assert_eq!(f.kind, "style");
    }
}
