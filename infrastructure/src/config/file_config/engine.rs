//! Engine and retry configuration from TOML (`[engine]`, `[retry]` sections)

use coach_application::{EngineConfig, RetryPolicy};
use coach_domain::DEFAULT_CONCURRENCY_LIMIT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw engine configuration from TOML
///
/// # Example
///
/// ```toml
/// [engine]
/// agent_concurrency = 4         # agents dispatched together per document
/// document_concurrency = 2      # documents processed at once
/// history_window = 5
/// ledger_path = "coach-ledger.jsonl"
/// event_log = "logs/run.events.jsonl"
/// builtin_agents = true         # start from the BRF catalog
/// builtin_rules = true          # start from the BRF validation rules
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEngineConfig {
    pub agent_concurrency: usize,
    pub document_concurrency: usize,
    pub history_window: usize,
    /// JSONL ledger file; the ledger is kept in memory when unset.
    pub ledger_path: Option<String>,
    /// JSONL run-event log file.
    pub event_log: Option<String>,
    pub builtin_agents: bool,
    pub builtin_rules: bool,
}

impl Default for FileEngineConfig {
    fn default() -> Self {
        Self {
            agent_concurrency: DEFAULT_CONCURRENCY_LIMIT,
            document_concurrency: 2,
            history_window: 5,
            ledger_path: None,
            event_log: None,
            builtin_agents: true,
            builtin_rules: true,
        }
    }
}

/// Raw retry configuration from TOML
///
/// Applies to both external services; each keeps its own timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub factor: f64,
    pub max_delay_ms: u64,
    pub jitter: f64,
    pub invoke_timeout_secs: u64,
    pub advisory_timeout_secs: u64,
}

impl Default for FileRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            factor: 2.0,
            max_delay_ms: 8_000,
            jitter: 0.2,
            invoke_timeout_secs: 30,
            advisory_timeout_secs: 30,
        }
    }
}

impl FileRetryConfig {
    fn policy(&self, timeout_secs: u64) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            factor: self.factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn invoke_policy(&self) -> RetryPolicy {
        self.policy(self.invoke_timeout_secs)
    }

    pub fn advisory_policy(&self) -> RetryPolicy {
        self.policy(self.advisory_timeout_secs)
    }
}

impl FileEngineConfig {
    /// Combine with the retry section into the application's engine config.
    pub fn to_engine_config(&self, retry: &FileRetryConfig) -> EngineConfig {
        EngineConfig {
            agent_concurrency: self.agent_concurrency,
            document_concurrency: self.document_concurrency,
            history_window: self.history_window,
            invoke_retry: retry.invoke_policy(),
            advisory_retry: retry.advisory_policy(),
        }
    }
}
