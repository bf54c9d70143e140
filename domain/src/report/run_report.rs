//! Per-agent, per-document and per-run report types.

use crate::agent::entities::PriorityTier;
use crate::coaching::{CoachingDecision, DecisionSource, Strategy};
use crate::core::ids::{AgentId, DocumentClass, DocumentId};
use crate::extraction::ExtractionPayload;
use crate::learning::LearningPhase;
use crate::quality::Metrics;
use crate::validation::{ValidationReport, ValidationWarning};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A committed decision as shown in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSummary {
    /// Round the decision was taken after.
    pub after_round: u32,
    pub strategy: Strategy,
    pub source: DecisionSource,
    pub confidence: f64,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_round: Option<u32>,
}

impl DecisionSummary {
    pub fn new(after_round: u32, decision: &CoachingDecision) -> Self {
        Self {
            after_round,
            strategy: decision.strategy,
            source: decision.source.clone(),
            confidence: decision.confidence,
            rationale: decision.rationale.clone(),
            target_round: decision.target_round(),
        }
    }
}

/// Result of one agent's coaching session on one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub agent_id: AgentId,
    pub tier: PriorityTier,
    /// Attempts recorded.
    pub rounds: u32,
    pub decisions: Vec<DecisionSummary>,
    /// Round chosen as the final result (best accuracy).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_round: Option<u32>,
    pub final_metrics: Metrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_payload: Option<ExtractionPayload>,
    /// Final accuracy reached the agent's confidence threshold.
    pub accepted: bool,
    /// Instruction version the agent ended the session with.
    pub instruction_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl AgentOutcome {
    /// Outcome for an agent that produced no attempt at all.
    pub fn failed(agent_id: AgentId, tier: PriorityTier, instruction_version: u32, reason: impl Into<String>) -> Self {
        Self {
            agent_id,
            tier,
            rounds: 0,
            decisions: Vec::new(),
            final_round: None,
            final_metrics: Metrics::default(),
            final_payload: None,
            accepted: false,
            instruction_version,
            failure: Some(reason.into()),
        }
    }

    pub fn accuracy(&self) -> f64 {
        self.final_metrics.accuracy
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Completed,
    Failed { reason: String },
    Cancelled,
    /// Already in the ledger from an earlier run.
    Skipped,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed { .. } => "failed",
            DocumentStatus::Cancelled => "cancelled",
            DocumentStatus::Skipped => "skipped",
        }
    }
}

/// Everything that happened to one document.
///
/// A failed or cancelled document keeps the outcomes of the agents that
/// finished before the run stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub document_id: DocumentId,
    pub document_class: DocumentClass,
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<LearningPhase>,
    pub agents: Vec<AgentOutcome>,
    pub unmatched_sections: Vec<String>,
    pub validation: ValidationReport,
    pub golden_promotions: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DocumentReport {
    pub fn new(document_id: DocumentId, document_class: DocumentClass, started_at: DateTime<Utc>) -> Self {
        Self {
            document_id,
            document_class,
            status: DocumentStatus::Completed,
            phase: None,
            agents: Vec::new(),
            unmatched_sections: Vec::new(),
            validation: ValidationReport::default(),
            golden_promotions: 0,
            started_at,
            finished_at: started_at,
        }
    }

    pub fn agents_run(&self) -> Vec<&AgentId> {
        self.agents.iter().map(|a| &a.agent_id).collect()
    }

    pub fn final_metrics(&self) -> BTreeMap<&AgentId, &Metrics> {
        self.agents.iter().map(|a| (&a.agent_id, &a.final_metrics)).collect()
    }

    /// Final payloads of agents that produced one, as input for cross-validation.
    pub fn final_payloads(&self) -> BTreeMap<AgentId, ExtractionPayload> {
        self.agents
            .iter()
            .filter_map(|a| a.final_payload.clone().map(|p| (a.agent_id.clone(), p)))
            .collect()
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.validation.warnings
    }

    pub fn mean_accuracy(&self) -> Option<f64> {
        if self.agents.is_empty() {
            return None;
        }
        Some(self.agents.iter().map(AgentOutcome::accuracy).sum::<f64>() / self.agents.len() as f64)
    }

    pub fn is_completed(&self) -> bool {
        self.status == DocumentStatus::Completed
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Aggregate counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub documents: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub skipped: usize,
    pub agent_runs: usize,
    pub agent_failures: usize,
    pub accepted: usize,
    pub warnings: usize,
    pub golden_promotions: usize,
    pub mean_accuracy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub documents: Vec<DocumentReport>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            documents: self.documents.len(),
            ..RunSummary::default()
        };
        let mut accuracies = Vec::new();
        for doc in &self.documents {
            match doc.status {
                DocumentStatus::Completed => summary.completed += 1,
                DocumentStatus::Failed { .. } => summary.failed += 1,
                DocumentStatus::Cancelled => summary.cancelled += 1,
                DocumentStatus::Skipped => summary.skipped += 1,
            }
            summary.agent_runs += doc.agents.len();
            summary.agent_failures += doc.agents.iter().filter(|a| !a.is_success()).count();
            summary.accepted += doc.agents.iter().filter(|a| a.accepted).count();
            summary.warnings += doc.warnings().len();
            summary.golden_promotions += doc.golden_promotions;
            accuracies.extend(doc.agents.iter().map(AgentOutcome::accuracy));
        }
        if !accuracies.is_empty() {
            summary.mean_accuracy = Some(accuracies.iter().sum::<f64>() / accuracies.len() as f64);
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.documents
            .iter()
            .any(|d| matches!(d.status, DocumentStatus::Failed { .. }))
    }
}
