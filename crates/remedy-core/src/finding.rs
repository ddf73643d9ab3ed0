use crate::types::Severity;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// FindingReport (wire format)
// ---------------------------------------------------------------------------

/// One finding as reported by the external analysis tool. Lenient on
/// optional fields so third-party reporters only need rule/file/line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingReport {
    #[serde(default)]
    pub rule: Option<String>,
    pub file: String,
    pub line: u32,
    #[serde(default)]
    pub end_line: Option<u32>,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
}

fn default_severity() -> Severity {
    Severity::Warning
}

// ---------------------------------------------------------------------------
// Finding
// ---------------------------------------------------------------------------

/// Rule name used when a finding carries no rule identifier.
pub const UNCATEGORIZED_RULE: &str = "uncategorized";

/// One normalized static-analysis finding. Immutable once reported: a fresh
/// analysis run supersedes the whole set, it never edits individual findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub rule: Option<String>,
    pub file: String,
    pub line: u32,
    pub end_line: u32,
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    /// Normalize a wire report. The id is derived from location and rule so
    /// the same finding set always yields the same ids regardless of the
    /// order the tool emitted them in.
    pub fn from_report(report: FindingReport) -> Self {
        let id = format!(
            "{}:{}:{}",
            report.file,
            report.line,
            report.rule.as_deref().unwrap_or(UNCATEGORIZED_RULE)
        );
        Finding {
            id,
            end_line: report.end_line.unwrap_or(report.line),
            rule: report.rule,
            file: report.file,
            line: report.line,
            severity: report.severity,
            message: report.message,
        }
    }

    /// The rule this finding is bucketed under for categorization.
    pub fn rule_name(&self) -> &str {
        self.rule.as_deref().unwrap_or(UNCATEGORIZED_RULE)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
