//! Agent entities

use crate::coaching::decision::{CoachingDecision, Strategy};
use crate::core::error::DomainError;
use crate::core::ids::AgentId;
use crate::extraction::schema::ExtractionSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Static execution priority. Tiers run strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    Critical,
    #[default]
    Important,
    Supporting,
}

impl PriorityTier {
    pub const ALL: [PriorityTier; 3] = [
        PriorityTier::Critical,
        PriorityTier::Important,
        PriorityTier::Supporting,
    ];

    /// Map a numeric priority (1 = highest) to a tier.
    pub fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            1 => Some(PriorityTier::Critical),
            2 => Some(PriorityTier::Important),
            3 => Some(PriorityTier::Supporting),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::Critical => "critical",
            PriorityTier::Important => "important",
            PriorityTier::Supporting => "supporting",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_confidence_threshold() -> f64 {
    0.7
}

/// Static description of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub id: AgentId,
    #[serde(default)]
    pub tier: PriorityTier,
    /// Section names this agent is responsible for.
    #[serde(default)]
    pub target_sections: Vec<String>,
    /// Alternate names for the target sections (synonyms, translations).
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Fragments for the last-resort containment scan.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub schema: ExtractionSchema,
    /// Accuracy below which the final result is flagged as not accepted.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    pub base_instruction: String,
}

impl AgentSpec {
    pub fn new(id: impl Into<AgentId>, tier: PriorityTier, base_instruction: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tier,
            target_sections: Vec::new(),
            aliases: Vec::new(),
            keywords: Vec::new(),
            schema: ExtractionSchema::default(),
            confidence_threshold: default_confidence_threshold(),
            base_instruction: base_instruction.into(),
        }
    }

    pub fn with_targets<S: Into<String>>(mut self, targets: impl IntoIterator<Item = S>) -> Self {
        self.target_sections = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_aliases<S: Into<String>>(mut self, aliases: impl IntoIterator<Item = S>) -> Self {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_keywords<S: Into<String>>(mut self, keywords: impl IntoIterator<Item = S>) -> Self {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_schema(mut self, schema: ExtractionSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }
}

/// One version of an agent's instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub version: u32,
    pub text: String,
}

/// Every instruction version an agent has used, plus the current pointer.
///
/// Versions are numbered from 1 and never removed, so a revert can always
/// restore the exact text used by an earlier attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstructionHistory {
    versions: Vec<Instruction>,
    current: u32,
}

impl InstructionHistory {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            versions: vec![Instruction {
                version: 1,
                text: base.into(),
            }],
            current: 1,
        }
    }

    pub fn current(&self) -> &Instruction {
        // `current` always points into `versions`
        &self.versions[(self.current - 1) as usize]
    }

    pub fn get(&self, version: u32) -> Option<&Instruction> {
        version
            .checked_sub(1)
            .and_then(|i| self.versions.get(i as usize))
    }

    pub fn versions(&self) -> &[Instruction] {
        &self.versions
    }

    pub fn latest_version(&self) -> u32 {
        self.versions.len() as u32
    }

    /// Append a new version and make it current.
    pub fn push(&mut self, text: impl Into<String>) -> u32 {
        let version = self.latest_version() + 1;
        self.versions.push(Instruction {
            version,
            text: text.into(),
        });
        self.current = version;
        version
    }

    /// Make an existing version current. Returns `false` if it does not exist.
    pub fn revert_to(&mut self, version: u32) -> bool {
        if self.get(version).is_some() {
            self.current = version;
            true
        } else {
            false
        }
    }
}

/// A committed change of an agent's current instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionChange {
    pub agent_id: AgentId,
    pub strategy: Strategy,
    pub from_version: u32,
    pub to_version: u32,
    pub text: String,
}

/// An agent with its mutable instruction state.
#[derive(Debug, Clone)]
pub struct Agent {
    spec: AgentSpec,
    instructions: InstructionHistory,
}

impl Agent {
    pub fn new(spec: AgentSpec) -> Self {
        let instructions = InstructionHistory::new(spec.base_instruction.clone());
        Self { spec, instructions }
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    pub fn id(&self) -> &AgentId {
        &self.spec.id
    }

    pub fn tier(&self) -> PriorityTier {
        self.spec.tier
    }

    pub fn current_instruction(&self) -> &Instruction {
        self.instructions.current()
    }

    pub fn instructions(&self) -> &InstructionHistory {
        &self.instructions
    }

    /// Commit a coaching decision.
    ///
    /// Returns the resulting change, or `None` when the decision leaves the
    /// current instruction as it is (Maintain, a revert to the current
    /// version, or a refinement identical to the current text).
    pub fn apply_decision(
        &mut self,
        decision: &CoachingDecision,
    ) -> Result<Option<InstructionChange>, DomainError> {
        let from_version = self.instructions.current().version;
        match decision.strategy {
            Strategy::Maintain => Ok(None),
            Strategy::Revert => {
                let Some(target) = decision.target.as_ref() else {
                    return Ok(None);
                };
                let version = target.instruction_version;
                if version == from_version {
                    return Ok(None);
                }
                if !self.instructions.revert_to(version) {
                    return Err(DomainError::UnknownInstructionVersion {
                        agent: self.spec.id.to_string(),
                        version,
                    });
                }
                Ok(Some(self.change(Strategy::Revert, from_version)))
            }
            Strategy::Refine | Strategy::Explore => {
                let Some(text) = decision.new_instruction.as_deref() else {
                    return Ok(None);
                };
                if text.trim() == self.instructions.current().text.trim() {
                    return Ok(None);
                }
                self.instructions.push(text);
                Ok(Some(self.change(decision.strategy, from_version)))
            }
        }
    }

    /// Re-apply a change recorded in an earlier run.
    pub fn replay(&mut self, change: &InstructionChange) {
        if self.instructions.get(change.to_version).is_some() {
            self.instructions.revert_to(change.to_version);
        } else {
            self.instructions.push(change.text.clone());
        }
    }

    fn change(&self, strategy: Strategy, from_version: u32) -> InstructionChange {
        let current = self.instructions.current();
        InstructionChange {
            agent_id: self.spec.id.clone(),
            strategy,
            from_version,
            to_version: current.version,
            text: current.text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coaching::decision::DecisionSource;
    use crate::core::ids::DocumentId;
    use crate::extraction::attempt::AttemptSummary;

    fn agent() -> Agent {
        Agent::new(AgentSpec::new("balance_sheet_agent", PriorityTier::Critical, "extract v1"))
    }

    fn decision(strategy: Strategy) -> CoachingDecision {
        CoachingDecision::new(strategy, 0.8, "test", DecisionSource::Fallback)
    }

    // ==================== PriorityTier ====================

    #[test]
    fn test_tier_ordering() {
        assert!(PriorityTier::Critical < PriorityTier::Important);
        assert!(PriorityTier::Important < PriorityTier::Supporting);
        assert_eq!(PriorityTier::from_rank(3), Some(PriorityTier::Supporting));
        assert_eq!(PriorityTier::from_rank(4), None);
    }

    // ==================== InstructionHistory ====================

    #[test]
    fn test_history_push_and_revert() {
        let mut history = InstructionHistory::new("v1");
        assert_eq!(history.push("v2"), 2);
        assert_eq!(history.push("v3"), 3);
        assert_eq!(history.current().text, "v3");
        assert!(history.revert_to(1));
        assert_eq!(history.current().text, "v1");
        assert_eq!(history.push("v4"), 4);
        assert!(!history.revert_to(9));
        assert!(history.get(0).is_none());
    }

    // ==================== apply_decision ====================

    #[test]
    fn test_maintain_changes_nothing() {
        let mut agent = agent();
        assert_eq!(agent.apply_decision(&decision(Strategy::Maintain)).unwrap(), None);
        assert_eq!(agent.current_instruction().version, 1);
    }

    #[test]
    fn test_refine_pushes_new_version() {
        let mut agent = agent();
        let d = decision(Strategy::Refine).with_instruction("extract v2");
        let change = agent.apply_decision(&d).unwrap().unwrap();
        assert_eq!(change.from_version, 1);
        assert_eq!(change.to_version, 2);
        assert_eq!(agent.current_instruction().text, "extract v2");

        let same = decision(Strategy::Explore).with_instruction("extract v2");
        assert_eq!(agent.apply_decision(&same).unwrap(), None);
    }

    #[test]
    fn test_revert_restores_target_version() {
        let mut agent = agent();
        agent
            .apply_decision(&decision(Strategy::Refine).with_instruction("extract v2"))
            .unwrap();
        let target = AttemptSummary {
            document_id: DocumentId::new("doc"),
            round: 1,
            instruction_version: 1,
            accuracy: 0.9,
        };
        let change = agent
            .apply_decision(&decision(Strategy::Revert).with_target(target))
            .unwrap()
            .unwrap();
        assert_eq!(change.to_version, 1);
        assert_eq!(agent.current_instruction().text, "extract v1");
    }

    #[test]
    fn test_revert_to_unknown_version_fails() {
        let mut agent = agent();
        let target = AttemptSummary {
            document_id: DocumentId::new("doc"),
            round: 1,
            instruction_version: 7,
            accuracy: 0.9,
        };
        let err = agent
            .apply_decision(&decision(Strategy::Revert).with_target(target))
            .unwrap_err();
        assert!(matches!(err, DomainError::UnknownInstructionVersion { version: 7, .. }));
    }

    #[test]
    fn test_replay_rebuilds_history() {
        let mut original = agent();
        let c1 = original
            .apply_decision(&decision(Strategy::Refine).with_instruction("v2"))
            .unwrap()
            .unwrap();
        let target = AttemptSummary {
            document_id: DocumentId::new("doc"),
            round: 1,
            instruction_version: 1,
            accuracy: 0.9,
        };
        let c2 = original
            .apply_decision(&decision(Strategy::Revert).with_target(target))
            .unwrap()
            .unwrap();

        let mut restored = agent();
        restored.replay(&c1);
        restored.replay(&c2);
        assert_eq!(restored.instructions(), original.instructions());
    }
}
