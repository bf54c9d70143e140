//! Extraction attempts.
//!
//! One attempt exists per (document, agent, round). Attempts are never
//! edited: a better result is a new round.

use super::payload::ExtractionPayload;
use crate::core::ids::{AgentId, DocumentClass, DocumentId};
use crate::quality::Metrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique key of an attempt within the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttemptKey {
    pub document_id: DocumentId,
    pub agent_id: AgentId,
    pub round: u32,
}

impl std::fmt::Display for AttemptKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.document_id, self.agent_id, self.round)
    }
}

/// A recorded extraction attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    pub document_id: DocumentId,
    #[serde(default)]
    pub document_class: DocumentClass,
    pub agent_id: AgentId,
    /// 1-based, strictly increasing per (document, agent).
    pub round: u32,
    pub instruction_version: u32,
    pub payload: ExtractionPayload,
    pub metrics: Metrics,
    /// Why the invocation produced no payload, if it failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ExtractionAttempt {
    pub fn new(
        document_id: DocumentId,
        document_class: DocumentClass,
        agent_id: AgentId,
        round: u32,
        instruction_version: u32,
        payload: ExtractionPayload,
        metrics: Metrics,
    ) -> Self {
        Self {
            document_id,
            document_class,
            agent_id,
            round,
            instruction_version,
            payload,
            metrics,
            failure: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_failure(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    pub fn with_recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at = at;
        self
    }

    pub fn key(&self) -> AttemptKey {
        AttemptKey {
            document_id: self.document_id.clone(),
            agent_id: self.agent_id.clone(),
            round: self.round,
        }
    }

    pub fn accuracy(&self) -> f64 {
        self.metrics.accuracy
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    pub fn summary(&self) -> AttemptSummary {
        AttemptSummary {
            document_id: self.document_id.clone(),
            round: self.round,
            instruction_version: self.instruction_version,
            accuracy: self.metrics.accuracy,
        }
    }
}

/// Compact view of an attempt used in performance records and decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub document_id: DocumentId,
    pub round: u32,
    pub instruction_version: u32,
    pub accuracy: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::EvaluationBasis;

    #[test]
    fn test_attempt_key_and_summary() {
        let metrics = Metrics::from_scores(0.8, 1.0, 0.8, 0.8, EvaluationBasis::Reference);
        let attempt = ExtractionAttempt::new(
            DocumentId::new("doc-1"),
            DocumentClass::default(),
            AgentId::new("balance_sheet_agent"),
            2,
            3,
            ExtractionPayload::new(),
            metrics,
        );
        assert_eq!(attempt.key().to_string(), "doc-1/balance_sheet_agent#2");
        let summary = attempt.summary();
        assert_eq!(summary.round, 2);
        assert_eq!(summary.instruction_version, 3);
        assert_eq!(summary.accuracy, 0.8);
        assert!(!attempt.is_failure());
    }

    #[test]
    fn test_failed_attempt_serializes_reason() {
        let attempt = ExtractionAttempt::new(
            DocumentId::new("d"),
            DocumentClass::default(),
            AgentId::new("a"),
            1,
            1,
            ExtractionPayload::new(),
            Metrics::zero(EvaluationBasis::SelfAssessed),
        )
        .with_failure("timeout");
        let json = serde_json::to_string(&attempt).unwrap();
        assert!(json.contains("\"failure\":\"timeout\""));
        let back: ExtractionAttempt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, attempt);
    }
}
