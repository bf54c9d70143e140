//! Operator view of the learning state.
//!
//! [`LearningStatus`] summarizes one ledger snapshot: the phase of every
//! document class, per-agent performance and stability, the most recent
//! coaching sessions, and the active golden set.

use super::ledger::{LedgerEntry, LedgerSnapshot};
use super::performance::{PerformanceRecord, Trend};
use super::phase::{LearningPhase, PhaseClassifier};
use crate::core::ids::{AgentId, DocumentClass, DocumentId};
use crate::extraction::attempt::ExtractionAttempt;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Parameters of a status view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusOptions {
    /// Attempts in each agent's performance window.
    pub window: usize,
    /// A full window whose spread stays at or below this is stable.
    pub stable_spread: f64,
    pub recent_sessions: usize,
}

impl Default for StatusOptions {
    fn default() -> Self {
        Self {
            window: 5,
            stable_spread: 0.02,
            recent_sessions: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassStatus {
    pub document_class: DocumentClass,
    pub documents: u64,
    pub phase: LearningPhase,
    /// Document count at which the next phase starts; `None` in the last phase.
    pub next_phase_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStatus {
    pub document_class: DocumentClass,
    pub agent_id: AgentId,
    pub documents: usize,
    pub attempts: usize,
    pub window_mean: f64,
    pub best_accuracy: f64,
    pub trend: Trend,
    /// Latest instruction version seen in the agent's attempts.
    pub instruction_version: u32,
    /// Consecutive latest attempts made with that version.
    pub stable_for: usize,
    /// Full window, spread within tolerance, and not declining.
    pub converged: bool,
}

/// All attempts of one (document, agent) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub document_id: DocumentId,
    pub document_class: DocumentClass,
    pub agent_id: AgentId,
    pub rounds: usize,
    pub initial_accuracy: f64,
    /// Best accuracy over the pair's rounds.
    pub final_accuracy: f64,
    pub finished_at: DateTime<Utc>,
    #[serde(skip)]
    last_seq: u64,
}

impl SessionStatus {
    pub fn improvement(&self) -> f64 {
        self.final_accuracy - self.initial_accuracy
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GoldenStatus {
    pub active: usize,
    /// Distinct (class, agent) pairs with at least one active example.
    pub agents: usize,
    pub mean_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningStatus {
    pub as_of_seq: u64,
    pub classes: Vec<ClassStatus>,
    /// Grouped by class, best window mean first.
    pub agents: Vec<AgentStatus>,
    /// Most recently active first.
    pub recent_sessions: Vec<SessionStatus>,
    pub golden: GoldenStatus,
}

impl LearningStatus {
    pub fn from_snapshot(
        snapshot: &LedgerSnapshot,
        classifier: &PhaseClassifier,
        options: &StatusOptions,
    ) -> Self {
        let classes = snapshot
            .document_classes()
            .map(|(class, documents)| ClassStatus {
                document_class: class.clone(),
                documents,
                phase: classifier.classify(documents),
                next_phase_at: classifier.next_phase_at(documents),
            })
            .collect();

        Self {
            as_of_seq: snapshot.as_of_seq,
            classes,
            agents: agent_statuses(snapshot, options),
            recent_sessions: recent_sessions(snapshot, options.recent_sessions),
            golden: golden_status(snapshot),
        }
    }

    pub fn converged_agents(&self) -> usize {
        self.agents.iter().filter(|a| a.converged).count()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

fn agent_statuses(snapshot: &LedgerSnapshot, options: &StatusOptions) -> Vec<AgentStatus> {
    let mut grouped: BTreeMap<(&DocumentClass, &AgentId), Vec<&ExtractionAttempt>> = BTreeMap::new();
    for attempt in snapshot.attempts() {
        grouped
            .entry((&attempt.document_class, &attempt.agent_id))
            .or_default()
            .push(attempt);
    }

    let mut agents: Vec<AgentStatus> = grouped
        .into_iter()
        .map(|((class, agent), attempts)| {
            let record = PerformanceRecord::from_attempts(
                class,
                agent,
                attempts.iter().copied(),
                options.window,
            );
            let instruction_version = attempts.last().map_or(1, |a| a.instruction_version);
            let stable_for = attempts
                .iter()
                .rev()
                .take_while(|a| a.instruction_version == instruction_version)
                .count();
            let documents: HashSet<&DocumentId> = attempts.iter().map(|a| &a.document_id).collect();
            let converged = record.window_is_full(options.window)
                && record.window_spread <= options.stable_spread
                && record.trend != Trend::Declining;
            AgentStatus {
                document_class: class.clone(),
                agent_id: agent.clone(),
                documents: documents.len(),
                attempts: record.total_attempts,
                window_mean: record.window_mean,
                best_accuracy: record.best_accuracy(),
                trend: record.trend,
                instruction_version,
                stable_for,
                converged,
            }
        })
        .collect();

    agents.sort_by(|a, b| {
        a.document_class
            .cmp(&b.document_class)
            .then(b.window_mean.total_cmp(&a.window_mean))
            .then(a.agent_id.cmp(&b.agent_id))
    });
    agents
}

fn recent_sessions(snapshot: &LedgerSnapshot, limit: usize) -> Vec<SessionStatus> {
    let mut sessions: HashMap<(&DocumentId, &AgentId), SessionStatus> = HashMap::new();
    for record in &snapshot.records {
        let LedgerEntry::Attempt(attempt) = &record.entry else {
            continue;
        };
        let accuracy = attempt.accuracy();
        sessions
            .entry((&attempt.document_id, &attempt.agent_id))
            .and_modify(|s| {
                s.rounds += 1;
                s.final_accuracy = s.final_accuracy.max(accuracy);
                s.finished_at = attempt.recorded_at;
                s.last_seq = record.seq;
            })
            .or_insert_with(|| SessionStatus {
                document_id: attempt.document_id.clone(),
                document_class: attempt.document_class.clone(),
                agent_id: attempt.agent_id.clone(),
                rounds: 1,
                initial_accuracy: accuracy,
                final_accuracy: accuracy,
                finished_at: attempt.recorded_at,
                last_seq: record.seq,
            });
    }

    let mut sessions: Vec<SessionStatus> = sessions.into_values().collect();
    sessions.sort_by(|a, b| b.last_seq.cmp(&a.last_seq));
    sessions.truncate(limit);
    sessions
}

fn golden_status(snapshot: &LedgerSnapshot) -> GoldenStatus {
    let golden = snapshot.golden_set();
    let scores: Vec<f64> = golden.iter().map(|e| e.score).collect();
    let agents: BTreeSet<(&DocumentClass, &AgentId)> = golden
        .iter()
        .map(|e| (&e.document_class, &e.agent_id))
        .collect();
    GoldenStatus {
        active: scores.len(),
        agents: agents.len(),
        mean_score: (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractionPayload;
    use crate::golden::{GoldenDeactivation, GoldenExample};
    use crate::learning::ledger::LedgerRecord;
    use crate::learning::phase::{PhaseRounds, PhaseThresholds};
    use crate::quality::{EvaluationBasis, Metrics};

    fn attempt(doc: &str, agent: &str, round: u32, version: u32, accuracy: f64) -> LedgerEntry {
        LedgerEntry::Attempt(ExtractionAttempt::new(
            DocumentId::new(doc),
            DocumentClass::new("brf"),
            AgentId::new(agent),
            round,
            version,
            ExtractionPayload::new(),
            Metrics::from_scores(accuracy, 1.0, accuracy, accuracy, EvaluationBasis::Reference),
        ))
    }

    fn golden(doc: &str, agent: &str, score: f64) -> GoldenExample {
        GoldenExample {
            agent_id: AgentId::new(agent),
            document_class: DocumentClass::new("brf"),
            document_id: DocumentId::new(doc),
            round: 1,
            payload: ExtractionPayload::new(),
            score,
            promoted_at: Utc::now(),
        }
    }

    fn snapshot(entries: Vec<LedgerEntry>) -> LedgerSnapshot {
        LedgerSnapshot::new(
            entries
                .into_iter()
                .enumerate()
                .map(|(i, entry)| LedgerRecord {
                    seq: i as u64 + 1,
                    entry,
                })
                .collect(),
        )
    }

    fn classifier() -> PhaseClassifier {
        PhaseClassifier::new(
            PhaseThresholds {
                exploration: 2,
                optimization: 4,
                convergence: 6,
            },
            PhaseRounds::default(),
        )
    }

    fn options(window: usize) -> StatusOptions {
        StatusOptions {
            window,
            ..StatusOptions::default()
        }
    }

    // ==================== Phases ====================

    #[test]
    fn test_class_phase_and_next_boundary() {
        let s = snapshot(vec![
            attempt("d1", "balance", 1, 1, 0.5),
            attempt("d2", "balance", 1, 1, 0.6),
            attempt("d3", "balance", 1, 1, 0.7),
        ]);
        let status = LearningStatus::from_snapshot(&s, &classifier(), &options(3));

        assert_eq!(status.classes.len(), 1);
        let class = &status.classes[0];
        assert_eq!(class.documents, 3);
        assert_eq!(class.phase, LearningPhase::Optimization);
        assert_eq!(class.next_phase_at, Some(5));
    }

    #[test]
    fn test_empty_ledger() {
        let status = LearningStatus::from_snapshot(
            &LedgerSnapshot::default(),
            &classifier(),
            &StatusOptions::default(),
        );
        assert!(status.is_empty());
        assert!(status.agents.is_empty());
        assert_eq!(status.golden, GoldenStatus::default());
    }

    // ==================== Agents ====================

    #[test]
    fn test_flat_full_window_is_converged() {
        let s = snapshot(vec![
            attempt("d1", "balance", 1, 1, 0.50),
            attempt("d1", "balance", 2, 2, 0.90),
            attempt("d2", "balance", 1, 2, 0.91),
            attempt("d3", "balance", 1, 2, 0.90),
            attempt("d1", "cash", 1, 1, 0.30),
            attempt("d2", "cash", 1, 2, 0.60),
        ]);
        let status = LearningStatus::from_snapshot(&s, &classifier(), &options(3));

        assert_eq!(status.agents.len(), 2);
        let balance = &status.agents[0];
        assert_eq!(balance.agent_id.as_str(), "balance");
        assert_eq!(balance.documents, 3);
        assert_eq!(balance.attempts, 4);
        assert_eq!(balance.instruction_version, 2);
        assert_eq!(balance.stable_for, 3);
        assert!(balance.converged);

        let cash = &status.agents[1];
        assert_eq!(cash.trend, Trend::Improving);
        assert!(!cash.converged);
        assert_eq!(status.converged_agents(), 1);
    }

    // ==================== Sessions ====================

    #[test]
    fn test_recent_sessions_newest_first() {
        let s = snapshot(vec![
            attempt("d1", "balance", 1, 1, 0.40),
            attempt("d2", "balance", 1, 1, 0.70),
            attempt("d1", "balance", 2, 2, 0.80),
            attempt("d1", "balance", 3, 3, 0.60),
        ]);
        let status = LearningStatus::from_snapshot(
            &s,
            &classifier(),
            &StatusOptions {
                recent_sessions: 1,
                ..StatusOptions::default()
            },
        );

        assert_eq!(status.recent_sessions.len(), 1);
        let session = &status.recent_sessions[0];
        assert_eq!(session.document_id.as_str(), "d1");
        assert_eq!(session.rounds, 3);
        assert_eq!(session.initial_accuracy, 0.40);
        assert_eq!(session.final_accuracy, 0.80);
        assert!((session.improvement() - 0.40).abs() < 1e-9);
    }

    // ==================== Golden ====================

    #[test]
    fn test_golden_counts_active_examples_only() {
        let s = snapshot(vec![
            attempt("d1", "balance", 1, 1, 0.96),
            LedgerEntry::GoldenPromoted(golden("d1", "balance", 0.96)),
            LedgerEntry::GoldenPromoted(golden("d2", "balance", 0.98)),
            LedgerEntry::GoldenPromoted(golden("d2", "cash", 0.94)),
            LedgerEntry::GoldenDeactivated(GoldenDeactivation {
                agent_id: AgentId::new("balance"),
                document_class: DocumentClass::new("brf"),
                document_id: DocumentId::new("d1"),
                round: 1,
                reason: "displaced".into(),
                deactivated_at: Utc::now(),
            }),
        ]);
        let status = LearningStatus::from_snapshot(&s, &classifier(), &StatusOptions::default());

        assert_eq!(status.golden.active, 2);
        assert_eq!(status.golden.agents, 2);
        let mean = status.golden.mean_score.unwrap();
        assert!((mean - 0.96).abs() < 1e-9);
    }
}
