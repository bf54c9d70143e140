//! Execution plan: tiers in priority order, each split into batches of at
//! most `concurrency_limit` agents.
//!
//! The plan is pure data. The application layer walks it stage by stage,
//! batch by batch, and only starts a batch once the previous one resolved.

use crate::agent::entities::PriorityTier;
use crate::routing::Assignment;
use serde::Serialize;

pub const DEFAULT_CONCURRENCY_LIMIT: usize = 4;

/// Agents dispatched together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    pub tier: PriorityTier,
    /// Position within its tier, from 0.
    pub index: usize,
    pub assignments: Vec<Assignment>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierStage {
    pub tier: PriorityTier,
    pub batches: Vec<Batch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionPlan {
    stages: Vec<TierStage>,
    concurrency_limit: usize,
}

impl ExecutionPlan {
    /// Build a plan from routed assignments.
    ///
    /// Tiers without assignments produce no stage. Declaration order is kept
    /// inside a tier. A limit of 0 is treated as 1.
    pub fn build(assignments: Vec<Assignment>, concurrency_limit: usize) -> Self {
        let limit = concurrency_limit.max(1);
        let stages = PriorityTier::ALL
            .iter()
            .filter_map(|&tier| {
                let members: Vec<Assignment> =
                    assignments.iter().filter(|a| a.tier == tier).cloned().collect();
                if members.is_empty() {
                    return None;
                }
                let batches = members
                    .chunks(limit)
                    .enumerate()
                    .map(|(index, chunk)| Batch {
                        tier,
                        index,
                        assignments: chunk.to_vec(),
                    })
                    .collect();
                Some(TierStage { tier, batches })
            })
            .collect();

        Self {
            stages,
            concurrency_limit: limit,
        }
    }

    pub fn stages(&self) -> &[TierStage] {
        &self.stages
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    pub fn batch_count(&self) -> usize {
        self.stages.iter().map(|s| s.batches.len()).sum()
    }

    pub fn agent_count(&self) -> usize {
        self.batches().map(Batch::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// All batches in execution order.
    pub fn batches(&self) -> impl Iterator<Item = &Batch> {
        self.stages.iter().flat_map(|s| s.batches.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::AgentId;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeSet;

    fn assignment(id: &str, tier: PriorityTier) -> Assignment {
        Assignment {
            agent_id: AgentId::new(id),
            tier,
            matches: Vec::new(),
            pages: BTreeSet::new(),
        }
    }

    fn ids(batch: &Batch) -> Vec<&str> {
        batch.assignments.iter().map(|a| a.agent_id.as_str()).collect()
    }

    #[test]
    fn test_tiers_run_in_priority_order() {
        let plan = ExecutionPlan::build(
            vec![
                assignment("audit", PriorityTier::Supporting),
                assignment("loans", PriorityTier::Important),
                assignment("balance", PriorityTier::Critical),
            ],
            4,
        );
        let tiers: Vec<PriorityTier> = plan.stages().iter().map(|s| s.tier).collect();
        assert_eq!(
            tiers,
            vec![PriorityTier::Critical, PriorityTier::Important, PriorityTier::Supporting]
        );
    }

    #[test]
    fn test_batches_keep_declaration_order() {
        let plan = ExecutionPlan::build(
            (0..6)
                .map(|i| assignment(&format!("a{i}"), PriorityTier::Important))
                .collect(),
            4,
        );
        let batches: Vec<&Batch> = plan.batches().collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(ids(batches[0]), vec!["a0", "a1", "a2", "a3"]);
        assert_eq!(ids(batches[1]), vec!["a4", "a5"]);
        assert_eq!(batches[1].index, 1);
    }

    #[test]
    fn test_zero_limit_means_one() {
        let plan = ExecutionPlan::build(
            vec![
                assignment("a", PriorityTier::Critical),
                assignment("b", PriorityTier::Critical),
            ],
            0,
        );
        assert_eq!(plan.concurrency_limit(), 1);
        assert_eq!(plan.batch_count(), 2);
    }

    #[test]
    fn test_empty_plan() {
        let plan = ExecutionPlan::build(Vec::new(), 4);
        assert!(plan.is_empty());
        assert_eq!(plan.agent_count(), 0);
    }

    #[test]
    fn test_random_compositions_respect_limit() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let limit = rng.gen_range(1..=6);
            let assignments: Vec<Assignment> = (0..rng.gen_range(0..30))
                .map(|i| {
                    let tier = PriorityTier::ALL[rng.gen_range(0..3)];
                    assignment(&format!("agent{i}"), tier)
                })
                .collect();
            let total = assignments.len();
            let plan = ExecutionPlan::build(assignments, limit);

            assert_eq!(plan.agent_count(), total);
            assert!(plan.batches().all(|b| !b.is_empty() && b.len() <= limit));
            let order: Vec<PriorityTier> = plan.batches().map(|b| b.tier).collect();
            assert!(order.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
