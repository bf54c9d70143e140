//! Engine parameters: use case control, not domain policy.

use super::retry_policy::RetryPolicy;
use coach_domain::{ConfigIssue, ConfigIssueCode, DEFAULT_CONCURRENCY_LIMIT};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Agents dispatched together within one document.
    pub agent_concurrency: usize,
    /// Documents processed at the same time.
    pub document_concurrency: usize,
    /// Size of the performance window handed to the selector.
    pub history_window: usize,
    /// Retry and timeout policy of the model-invocation service.
    pub invoke_retry: RetryPolicy,
    /// Retry and timeout policy of the advisory service.
    pub advisory_retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agent_concurrency: DEFAULT_CONCURRENCY_LIMIT,
            document_concurrency: 2,
            history_window: 5,
            invoke_retry: RetryPolicy::default(),
            advisory_retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    // ==================== Builder Methods ====================

    pub fn with_agent_concurrency(mut self, limit: usize) -> Self {
        self.agent_concurrency = limit;
        self
    }

    pub fn with_document_concurrency(mut self, limit: usize) -> Self {
        self.document_concurrency = limit;
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.invoke_retry = policy.clone();
        self.advisory_retry = policy;
        self
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        for (name, value) in [
            ("engine.agent_concurrency", self.agent_concurrency),
            ("engine.document_concurrency", self.document_concurrency),
        ] {
            if value == 0 {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::ZeroConcurrency,
                    format!("{name} must be at least 1"),
                ));
            }
        }
        if self.history_window < 2 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ThresholdOutOfRange,
                "engine.history_window below 2 disables trend detection",
            ));
        }
        issues.extend(self.invoke_retry.validate());
        issues.extend(self.advisory_retry.validate());
        issues
    }
}
