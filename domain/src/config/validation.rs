//! Structured configuration issues.
//!
//! Validators across the workspace (phase thresholds, selector thresholds,
//! the agent catalog, cross-validation rules, file configuration) report
//! problems as a list of [`ConfigIssue`]s instead of failing on the first
//! one, so the operator sees everything that is wrong at once.
//!
//! # Examples
//!
//! ```
//! use coach_domain::config::{ConfigIssue, ConfigIssueCode, Severity, has_errors};
//!
//! let issues = vec![ConfigIssue::warning(
//!     ConfigIssueCode::AgentWithoutTargets,
//!     "agent 'x' declares no target sections",
//! )];
//! assert!(!has_errors(&issues));
//! ```

use serde::Serialize;
use std::fmt;

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigIssueCode {
    /// Phase thresholds are not strictly increasing.
    PhaseThresholdsOutOfOrder,
    /// A phase allows zero coaching rounds.
    ZeroMaxRounds,
    /// A score threshold lies outside `[0, 1]`.
    ThresholdOutOfRange,
    /// A concurrency limit of zero.
    ZeroConcurrency,
    /// Two agents share the same id.
    DuplicateAgent,
    /// An agent declares no target sections, aliases or keywords.
    AgentWithoutTargets,
    /// A validation rule references an agent that is not in the catalog.
    UnknownAgentInRule,
    /// A validation rule is malformed (no fields, negative tolerance).
    InvalidValidationRule,
    /// Retry policy bounds are inconsistent.
    InvalidRetryPolicy,
    /// A timeout of zero.
    ZeroTimeout,
    /// A required provider setting (endpoint, model) is empty.
    MissingProviderSetting,
}

/// A detected configuration problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{level}: {}", self.message)
    }
}

/// Check whether any issues are errors (i.e. fatal).
pub fn has_errors(issues: &[ConfigIssue]) -> bool {
    issues.iter().any(ConfigIssue::is_error)
}

/// Push an error when `value` is not within `[0, 1]`.
pub fn check_unit_interval(issues: &mut Vec<ConfigIssue>, name: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        issues.push(ConfigIssue::error(
            ConfigIssueCode::ThresholdOutOfRange,
            format!("{name} must be within [0, 1], got {value}"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_errors() {
        let warning = ConfigIssue::warning(ConfigIssueCode::DuplicateAgent, "dup");
        let error = ConfigIssue::error(ConfigIssueCode::ZeroConcurrency, "zero");
        assert!(!has_errors(std::slice::from_ref(&warning)));
        assert!(has_errors(&[warning, error]));
    }

    #[test]
    fn test_check_unit_interval() {
        let mut issues = Vec::new();
        check_unit_interval(&mut issues, "golden.threshold", 0.95);
        assert!(issues.is_empty());
        check_unit_interval(&mut issues, "golden.threshold", 1.5);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, ConfigIssueCode::ThresholdOutOfRange);
        assert!(issues[0].to_string().starts_with("error: golden.threshold"));
    }
}
