use crate::config::validation::{ConfigIssue, ConfigIssueCode, check_unit_interval};
use crate::core::ids::{AgentId, DocumentClass, DocumentId};
use crate::extraction::attempt::{AttemptKey, ExtractionAttempt};
use crate::extraction::payload::ExtractionPayload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Promotion threshold and per-agent capacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoldenPolicy {
    pub threshold: f64,
    pub top_k: usize,
}

impl Default for GoldenPolicy {
    fn default() -> Self {
        Self {
            threshold: 0.95,
            top_k: 3,
        }
    }
}

impl GoldenPolicy {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        check_unit_interval(&mut issues, "golden.threshold", self.threshold);
        if self.top_k == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ThresholdOutOfRange,
                "golden.top_k = 0 disables golden examples",
            ));
        }
        issues
    }
}

/// A retained high-quality extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenExample {
    pub agent_id: AgentId,
    pub document_class: DocumentClass,
    pub document_id: DocumentId,
    pub round: u32,
    pub payload: ExtractionPayload,
    /// Accuracy at promotion time; never re-validated.
    pub score: f64,
    pub promoted_at: DateTime<Utc>,
}

impl GoldenExample {
    pub fn key(&self) -> AttemptKey {
        AttemptKey {
            document_id: self.document_id.clone(),
            agent_id: self.agent_id.clone(),
            round: self.round,
        }
    }
}

/// Removal of an example from the active set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenDeactivation {
    pub agent_id: AgentId,
    pub document_class: DocumentClass,
    pub document_id: DocumentId,
    pub round: u32,
    pub reason: String,
    pub deactivated_at: DateTime<Utc>,
}

/// A change to the golden set, to be recorded in the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum GoldenAction {
    Promote(GoldenExample),
    Deactivate(GoldenDeactivation),
}

type SetKey = (DocumentClass, AgentId);

/// Active golden examples, sorted by descending score per key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoldenSet {
    active: BTreeMap<SetKey, Vec<GoldenExample>>,
}

impl GoldenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self, class: &DocumentClass, agent: &AgentId) -> &[GoldenExample] {
        self.active
            .get(&(class.clone(), agent.clone()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, class: &DocumentClass, key: &AttemptKey) -> bool {
        self.active(class, &key.agent_id)
            .iter()
            .any(|e| e.document_id == key.document_id && e.round == key.round)
    }

    pub fn len(&self) -> usize {
        self.active.values().map(Vec::len).sum()
    }

    /// Every active example, grouped by (class, agent).
    pub fn iter(&self) -> impl Iterator<Item = &GoldenExample> {
        self.active.values().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn apply(&mut self, action: &GoldenAction) {
        match action {
            GoldenAction::Promote(example) => {
                let entry = self
                    .active
                    .entry((example.document_class.clone(), example.agent_id.clone()))
                    .or_default();
                entry.push(example.clone());
                entry.sort_by(|a, b| b.score.total_cmp(&a.score));
            }
            GoldenAction::Deactivate(d) => {
                if let Some(entry) = self
                    .active
                    .get_mut(&(d.document_class.clone(), d.agent_id.clone()))
                {
                    entry.retain(|e| !(e.document_id == d.document_id && e.round == d.round));
                }
            }
        }
    }
}

/// Decides promotions for recorded attempts.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoldenCurator {
    policy: GoldenPolicy,
}

impl GoldenCurator {
    pub fn new(policy: GoldenPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &GoldenPolicy {
        &self.policy
    }

    pub fn qualifies(&self, attempt: &ExtractionAttempt) -> bool {
        !attempt.is_failure() && attempt.accuracy() >= self.policy.threshold
    }

    /// Actions needed to admit `attempt`, or none if it does not qualify
    /// or cannot displace the weakest active example.
    pub fn curate(&self, set: &GoldenSet, attempt: &ExtractionAttempt) -> Vec<GoldenAction> {
        if self.policy.top_k == 0 || !self.qualifies(attempt) {
            return Vec::new();
        }
        if set.contains(&attempt.document_class, &attempt.key()) {
            return Vec::new();
        }

        let promote = GoldenAction::Promote(GoldenExample {
            agent_id: attempt.agent_id.clone(),
            document_class: attempt.document_class.clone(),
            document_id: attempt.document_id.clone(),
            round: attempt.round,
            payload: attempt.payload.clone(),
            score: attempt.accuracy(),
            promoted_at: Utc::now(),
        });

        let active = set.active(&attempt.document_class, &attempt.agent_id);
        if active.len() < self.policy.top_k {
            return vec![promote];
        }

        // Sorted descending, so the weakest is last
        match active.last() {
            Some(weakest) if attempt.accuracy() > weakest.score => vec![
                GoldenAction::Deactivate(GoldenDeactivation {
                    agent_id: weakest.agent_id.clone(),
                    document_class: weakest.document_class.clone(),
                    document_id: weakest.document_id.clone(),
                    round: weakest.round,
                    reason: format!(
                        "displaced by {} ({:.3} > {:.3})",
                        attempt.key(),
                        attempt.accuracy(),
                        weakest.score
                    ),
                    deactivated_at: Utc::now(),
                }),
                promote,
            ],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::{EvaluationBasis, Metrics};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn attempt(doc: &str, accuracy: f64) -> ExtractionAttempt {
        ExtractionAttempt::new(
            DocumentId::new(doc),
            DocumentClass::default(),
            AgentId::new("balance_sheet_agent"),
            1,
            1,
            ExtractionPayload::new(),
            Metrics::from_scores(accuracy, 1.0, accuracy, accuracy, EvaluationBasis::Reference),
        )
    }

    fn admit(curator: &GoldenCurator, set: &mut GoldenSet, a: &ExtractionAttempt) -> usize {
        let actions = curator.curate(set, a);
        for action in &actions {
            set.apply(action);
        }
        actions.len()
    }

    #[test]
    fn test_below_threshold_is_not_promoted() {
        let curator = GoldenCurator::default();
        let mut set = GoldenSet::new();
        assert_eq!(admit(&curator, &mut set, &attempt("d1", 0.949)), 0);
        assert!(set.is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let curator = GoldenCurator::default();
        let mut set = GoldenSet::new();
        assert_eq!(admit(&curator, &mut set, &attempt("d1", 0.95)), 1);
        assert_eq!(set.len(), 1);
        // Same attempt again is a no-op
        assert_eq!(admit(&curator, &mut set, &attempt("d1", 0.95)), 0);
    }

    #[test]
    fn test_failed_attempt_is_not_promoted() {
        let curator = GoldenCurator::default();
        let failed = attempt("d1", 1.0).with_failure("timeout");
        assert!(curator.curate(&GoldenSet::new(), &failed).is_empty());
    }

    #[test]
    fn test_top_k_displaces_weakest() {
        let curator = GoldenCurator::default();
        let mut set = GoldenSet::new();
        for (doc, score) in [("d1", 0.96), ("d2", 0.97), ("d3", 0.98)] {
            admit(&curator, &mut set, &attempt(doc, score));
        }
        assert_eq!(admit(&curator, &mut set, &attempt("d4", 0.955)), 0);
        assert_eq!(admit(&curator, &mut set, &attempt("d5", 0.99)), 2);

        let active = set.active(&DocumentClass::default(), &AgentId::new("balance_sheet_agent"));
        let docs: Vec<&str> = active.iter().map(|e| e.document_id.as_str()).collect();
        assert_eq!(docs, vec!["d5", "d3", "d2"]);
    }

    #[test]
    fn test_active_set_invariants_hold_for_random_sequences() {
        let mut rng = StdRng::seed_from_u64(11);
        let policy = GoldenPolicy {
            threshold: 0.9,
            top_k: 3,
        };
        let curator = GoldenCurator::new(policy);
        for _ in 0..50 {
            let mut set = GoldenSet::new();
            let mut qualifying = Vec::new();
            for i in 0..30 {
                let score: f64 = rng.gen_range(0.7..1.0);
                let a = attempt(&format!("d{i}"), score);
                if score >= policy.threshold {
                    qualifying.push(score);
                }
                admit(&curator, &mut set, &a);
            }
            let active = set.active(&DocumentClass::default(), &AgentId::new("balance_sheet_agent"));
            assert!(active.len() <= policy.top_k);
            assert!(active.iter().all(|e| e.score >= policy.threshold));
            qualifying.sort_by(|a, b| b.total_cmp(a));
            let expected: Vec<f64> = qualifying.into_iter().take(policy.top_k).collect();
            let actual: Vec<f64> = active.iter().map(|e| e.score).collect();
            assert_eq!(actual, expected);
        }
    }
}
