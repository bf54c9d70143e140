//! Performance ledger entries and snapshots.
//!
//! The ledger is append-only. Stores hand out [`LedgerSnapshot`]s: a
//! consistent prefix of the log up to `as_of_seq`. Everything the selector
//! needs (phase, performance record, golden set, instruction history) is
//! aggregated from a snapshot by pure functions.

use super::performance::PerformanceRecord;
use super::phase::LearningPhase;
use crate::agent::entities::InstructionChange;
use crate::coaching::decision::CoachingDecision;
use crate::core::ids::{AgentId, DocumentClass, DocumentId};
use crate::extraction::attempt::ExtractionAttempt;
use crate::golden::curator::{GoldenAction, GoldenDeactivation, GoldenExample, GoldenSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// A committed coaching decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub document_id: DocumentId,
    #[serde(default)]
    pub document_class: DocumentClass,
    pub agent_id: AgentId,
    /// Round the decision was taken after.
    pub round: u32,
    pub phase: LearningPhase,
    pub decision: CoachingDecision,
    pub recorded_at: DateTime<Utc>,
}

/// A committed instruction change, with the document that triggered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionChangeRecord {
    pub document_id: DocumentId,
    pub change: InstructionChange,
    pub recorded_at: DateTime<Utc>,
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEntry {
    Attempt(ExtractionAttempt),
    Decision(DecisionRecord),
    InstructionChanged(InstructionChangeRecord),
    GoldenPromoted(GoldenExample),
    GoldenDeactivated(GoldenDeactivation),
}

/// Discriminant of [`LedgerEntry`], for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    Attempt,
    Decision,
    InstructionChanged,
    GoldenPromoted,
    GoldenDeactivated,
}

impl LedgerEntry {
    pub fn kind(&self) -> LedgerEntryKind {
        match self {
            LedgerEntry::Attempt(_) => LedgerEntryKind::Attempt,
            LedgerEntry::Decision(_) => LedgerEntryKind::Decision,
            LedgerEntry::InstructionChanged(_) => LedgerEntryKind::InstructionChanged,
            LedgerEntry::GoldenPromoted(_) => LedgerEntryKind::GoldenPromoted,
            LedgerEntry::GoldenDeactivated(_) => LedgerEntryKind::GoldenDeactivated,
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        match self {
            LedgerEntry::Attempt(a) => &a.agent_id,
            LedgerEntry::Decision(d) => &d.agent_id,
            LedgerEntry::InstructionChanged(c) => &c.change.agent_id,
            LedgerEntry::GoldenPromoted(g) => &g.agent_id,
            LedgerEntry::GoldenDeactivated(g) => &g.agent_id,
        }
    }

    pub fn document_id(&self) -> &DocumentId {
        match self {
            LedgerEntry::Attempt(a) => &a.document_id,
            LedgerEntry::Decision(d) => &d.document_id,
            LedgerEntry::InstructionChanged(c) => &c.document_id,
            LedgerEntry::GoldenPromoted(g) => &g.document_id,
            LedgerEntry::GoldenDeactivated(g) => &g.document_id,
        }
    }

    /// Document class, for entries keyed by one.
    pub fn document_class(&self) -> Option<&DocumentClass> {
        match self {
            LedgerEntry::Attempt(a) => Some(&a.document_class),
            LedgerEntry::Decision(d) => Some(&d.document_class),
            LedgerEntry::InstructionChanged(_) => None,
            LedgerEntry::GoldenPromoted(g) => Some(&g.document_class),
            LedgerEntry::GoldenDeactivated(g) => Some(&g.document_class),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LedgerEntry::Attempt(a) => a.recorded_at,
            LedgerEntry::Decision(d) => d.recorded_at,
            LedgerEntry::InstructionChanged(c) => c.recorded_at,
            LedgerEntry::GoldenPromoted(g) => g.promoted_at,
            LedgerEntry::GoldenDeactivated(g) => g.deactivated_at,
        }
    }
}

impl From<GoldenAction> for LedgerEntry {
    fn from(action: GoldenAction) -> Self {
        match action {
            GoldenAction::Promote(example) => LedgerEntry::GoldenPromoted(example),
            GoldenAction::Deactivate(d) => LedgerEntry::GoldenDeactivated(d),
        }
    }
}

/// An entry with its position in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// 1-based, strictly increasing.
    pub seq: u64,
    #[serde(flatten)]
    pub entry: LedgerEntry,
}

/// Query filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerFilter {
    pub document_class: Option<DocumentClass>,
    pub agent_id: Option<AgentId>,
    pub document_id: Option<DocumentId>,
    pub kinds: Vec<LedgerEntryKind>,
    pub after_seq: Option<u64>,
}

impl LedgerFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn class(mut self, class: DocumentClass) -> Self {
        self.document_class = Some(class);
        self
    }

    pub fn agent(mut self, agent: AgentId) -> Self {
        self.agent_id = Some(agent);
        self
    }

    pub fn document(mut self, document: DocumentId) -> Self {
        self.document_id = Some(document);
        self
    }

    pub fn kind(mut self, kind: LedgerEntryKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn after(mut self, seq: u64) -> Self {
        self.after_seq = Some(seq);
        self
    }

    pub fn matches(&self, record: &LedgerRecord) -> bool {
        let entry = &record.entry;
        if self.after_seq.is_some_and(|s| record.seq <= s) {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&entry.kind()) {
            return false;
        }
        if self.agent_id.as_ref().is_some_and(|a| a != entry.agent_id()) {
            return false;
        }
        if self.document_id.as_ref().is_some_and(|d| d != entry.document_id()) {
            return false;
        }
        if let Some(class) = &self.document_class
            && entry.document_class().is_some_and(|c| c != class)
        {
            return false;
        }
        true
    }
}

/// Rejected append of an attempt whose round breaks the per-pair sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundViolation {
    pub document_id: DocumentId,
    pub agent_id: AgentId,
    pub expected: u32,
    pub got: u32,
}

impl fmt::Display for RoundViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "round {} for {}/{} breaks the sequence (expected {})",
            self.got, self.document_id, self.agent_id, self.expected
        )
    }
}

/// Tracks the last round per (document, agent) so stores can reject
/// duplicate or out-of-order attempts.
#[derive(Debug, Clone, Default)]
pub struct RoundIndex {
    last: HashMap<(DocumentId, AgentId), u32>,
}

impl RoundIndex {
    /// Check that `entry` may be appended and record it if so.
    ///
    /// Non-attempt entries are always admitted.
    pub fn admit(&mut self, entry: &LedgerEntry) -> Result<(), RoundViolation> {
        self.check(entry)?;
        self.record(entry);
        Ok(())
    }

    /// Check `entry` without recording it.
    pub fn check(&self, entry: &LedgerEntry) -> Result<(), RoundViolation> {
        let LedgerEntry::Attempt(attempt) = entry else {
            return Ok(());
        };
        let key = (attempt.document_id.clone(), attempt.agent_id.clone());
        let expected = self.last.get(&key).map_or(1, |r| r + 1);
        if attempt.round != expected {
            return Err(RoundViolation {
                document_id: attempt.document_id.clone(),
                agent_id: attempt.agent_id.clone(),
                expected,
                got: attempt.round,
            });
        }
        Ok(())
    }

    fn record(&mut self, entry: &LedgerEntry) {
        if let LedgerEntry::Attempt(attempt) = entry {
            self.last
                .insert((attempt.document_id.clone(), attempt.agent_id.clone()), attempt.round);
        }
    }
}

/// Distinct documents with at least one attempt, per document class.
///
/// Stores maintain one alongside their records so the learning phase can be
/// read without scanning the log.
#[derive(Debug, Clone, Default)]
pub struct DocumentCounter {
    seen: HashMap<DocumentClass, HashSet<DocumentId>>,
}

impl DocumentCounter {
    pub fn record(&mut self, entry: &LedgerEntry) {
        if let LedgerEntry::Attempt(attempt) = entry
            && !self
                .seen
                .get(&attempt.document_class)
                .is_some_and(|docs| docs.contains(&attempt.document_id))
        {
            self.seen
                .entry(attempt.document_class.clone())
                .or_default()
                .insert(attempt.document_id.clone());
        }
    }

    pub fn count(&self, class: &DocumentClass) -> u64 {
        self.seen.get(class).map_or(0, |docs| docs.len() as u64)
    }

    pub fn counts(&self) -> BTreeMap<DocumentClass, u64> {
        self.seen
            .iter()
            .map(|(class, docs)| (class.clone(), docs.len() as u64))
            .collect()
    }
}

/// A consistent prefix of the ledger.
///
/// Records are shared with the store, so taking a snapshot never copies
/// payloads. Document counts cover the whole log up to `as_of_seq`, not just
/// the records that matched the filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerSnapshot {
    pub as_of_seq: u64,
    pub records: Vec<Arc<LedgerRecord>>,
    documents: BTreeMap<DocumentClass, u64>,
}

impl LedgerSnapshot {
    /// Snapshot over `records` alone; document counts are derived from them.
    pub fn new(records: Vec<LedgerRecord>) -> Self {
        let as_of_seq = records.last().map_or(0, |r| r.seq);
        let mut counter = DocumentCounter::default();
        for record in &records {
            counter.record(&record.entry);
        }
        Self {
            as_of_seq,
            records: records.into_iter().map(Arc::new).collect(),
            documents: counter.counts(),
        }
    }

    /// Snapshot handed out by a store: shared records plus log-wide counts.
    pub fn from_shared(
        as_of_seq: u64,
        records: Vec<Arc<LedgerRecord>>,
        documents: BTreeMap<DocumentClass, u64>,
    ) -> Self {
        Self {
            as_of_seq,
            records,
            documents,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn attempts(&self) -> impl Iterator<Item = &ExtractionAttempt> {
        self.records.iter().filter_map(|r| match &r.entry {
            LedgerEntry::Attempt(a) => Some(a),
            _ => None,
        })
    }

    /// Distinct documents with at least one attempt in `class`.
    pub fn distinct_documents(&self, class: &DocumentClass) -> u64 {
        self.documents.get(class).copied().unwrap_or(0)
    }

    /// Log-wide distinct document counts per class.
    pub fn document_classes(&self) -> impl Iterator<Item = (&DocumentClass, u64)> {
        self.documents.iter().map(|(class, count)| (class, *count))
    }

    /// Documents with at least one attempt in this snapshot.
    pub fn processed_documents(&self) -> BTreeSet<&DocumentId> {
        self.attempts().map(|a| &a.document_id).collect()
    }

    pub fn performance(
        &self,
        class: &DocumentClass,
        agent: &AgentId,
        window: usize,
    ) -> PerformanceRecord {
        PerformanceRecord::from_attempts(class, agent, self.attempts(), window)
    }

    /// Next round number for a (document, agent) pair.
    pub fn next_round(&self, document: &DocumentId, agent: &AgentId) -> u32 {
        self.attempts()
            .filter(|a| &a.document_id == document && &a.agent_id == agent)
            .map(|a| a.round)
            .max()
            .map_or(1, |r| r + 1)
    }

    pub fn instruction_changes(&self) -> impl Iterator<Item = &InstructionChange> {
        self.records.iter().filter_map(|r| match &r.entry {
            LedgerEntry::InstructionChanged(c) => Some(&c.change),
            _ => None,
        })
    }

    pub fn golden_set(&self) -> GoldenSet {
        let mut set = GoldenSet::new();
        for record in &self.records {
            match &record.entry {
                LedgerEntry::GoldenPromoted(g) => set.apply(&GoldenAction::Promote(g.clone())),
                LedgerEntry::GoldenDeactivated(d) => {
                    set.apply(&GoldenAction::Deactivate(d.clone()))
                }
                _ => {}
            }
        }
        set
    }

    pub fn filter(&self, filter: &LedgerFilter) -> Vec<LedgerRecord> {
        self.records
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| LedgerRecord::clone(r))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coaching::decision::{DecisionSource, Strategy};
    use crate::extraction::payload::ExtractionPayload;
    use crate::quality::{EvaluationBasis, Metrics};

    fn attempt(doc: &str, agent: &str, round: u32, class: &str) -> ExtractionAttempt {
        ExtractionAttempt::new(
            DocumentId::new(doc),
            DocumentClass::new(class),
            AgentId::new(agent),
            round,
            1,
            ExtractionPayload::new(),
            Metrics::zero(EvaluationBasis::Reference),
        )
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

    // ==================== RoundIndex ====================

    #[test]
    fn test_round_index_requires_consecutive_rounds() {
        let mut index = RoundIndex::default();
        assert!(index.admit(&LedgerEntry::Attempt(attempt("d", "a", 1, "c"))).is_ok());
        assert!(index.admit(&LedgerEntry::Attempt(attempt("d", "a", 2, "c"))).is_ok());
        let dup = index
            .admit(&LedgerEntry::Attempt(attempt("d", "a", 2, "c")))
            .unwrap_err();
        assert_eq!(dup.expected, 3);
        assert!(index.admit(&LedgerEntry::Attempt(attempt("d", "b", 2, "c"))).is_err());
        assert!(index.admit(&LedgerEntry::Attempt(attempt("e", "a", 1, "c"))).is_ok());
    }

    // ==================== Snapshot aggregation ====================

    #[test]
    fn test_distinct_documents_per_class() {
        let s = snapshot(vec![
            LedgerEntry::Attempt(attempt("d1", "a", 1, "brf")),
            LedgerEntry::Attempt(attempt("d1", "a", 2, "brf")),
            LedgerEntry::Attempt(attempt("d2", "b", 1, "brf")),
            LedgerEntry::Attempt(attempt("d3", "a", 1, "other")),
        ]);
        assert_eq!(s.distinct_documents(&DocumentClass::new("brf")), 2);
        assert_eq!(s.distinct_documents(&DocumentClass::new("other")), 1);
        assert_eq!(s.next_round(&DocumentId::new("d1"), &AgentId::new("a")), 3);
        assert_eq!(s.next_round(&DocumentId::new("d9"), &AgentId::new("a")), 1);
        assert_eq!(s.as_of_seq, 4);
    }

    #[test]
    fn test_document_counter_ignores_repeat_rounds() {
        let mut counter = DocumentCounter::default();
        for entry in [
            LedgerEntry::Attempt(attempt("d1", "a", 1, "brf")),
            LedgerEntry::Attempt(attempt("d1", "a", 2, "brf")),
            LedgerEntry::Attempt(attempt("d1", "b", 1, "brf")),
            LedgerEntry::Attempt(attempt("d2", "a", 1, "brf")),
        ] {
            counter.record(&entry);
        }
        assert_eq!(counter.count(&DocumentClass::new("brf")), 2);
        assert_eq!(counter.count(&DocumentClass::new("other")), 0);
    }

    #[test]
    fn test_shared_snapshot_keeps_log_wide_counts() {
        let record = Arc::new(LedgerRecord {
            seq: 9,
            entry: LedgerEntry::Attempt(attempt("d1", "a", 1, "brf")),
        });
        let counts = BTreeMap::from([(DocumentClass::new("brf"), 40)]);
        let s = LedgerSnapshot::from_shared(12, vec![record.clone()], counts);
        assert_eq!(s.distinct_documents(&DocumentClass::new("brf")), 40);
        assert_eq!(s.as_of_seq, 12);
        assert!(Arc::ptr_eq(&s.records[0], &record));
    }

    #[test]
    fn test_filter() {
        let decision = DecisionRecord {
            document_id: DocumentId::new("d1"),
            document_class: DocumentClass::new("brf"),
            agent_id: AgentId::new("a"),
            round: 1,
            phase: LearningPhase::Exploration,
            decision: CoachingDecision::new(Strategy::Maintain, 1.0, "ok", DecisionSource::Fallback),
            recorded_at: Utc::now(),
        };
        let s = snapshot(vec![
            LedgerEntry::Attempt(attempt("d1", "a", 1, "brf")),
            LedgerEntry::Decision(decision),
            LedgerEntry::Attempt(attempt("d2", "b", 1, "brf")),
        ]);
        assert_eq!(s.filter(&LedgerFilter::all()).len(), 3);
        assert_eq!(s.filter(&LedgerFilter::all().agent(AgentId::new("a"))).len(), 2);
        assert_eq!(
            s.filter(&LedgerFilter::all().kind(LedgerEntryKind::Decision)).len(),
            1
        );
        assert_eq!(s.filter(&LedgerFilter::all().after(2)).len(), 1);
        assert_eq!(
            s.filter(&LedgerFilter::all().class(DocumentClass::new("other"))).len(),
            0
        );
    }

    #[test]
    fn test_record_serde_is_flat_and_tagged() {
        let record = LedgerRecord {
            seq: 7,
            entry: LedgerEntry::Attempt(attempt("d1", "a", 1, "brf")),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["seq"], 7);
        assert_eq!(json["type"], "attempt");
        assert_eq!(json["document_id"], "d1");
        let back: LedgerRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_golden_set_rebuilt_from_entries() {
        let example = GoldenExample {
            agent_id: AgentId::new("a"),
            document_class: DocumentClass::new("brf"),
            document_id: DocumentId::new("d1"),
            round: 1,
            payload: ExtractionPayload::new(),
            score: 0.97,
            promoted_at: Utc::now(),
        };
        let deactivation = GoldenDeactivation {
            agent_id: AgentId::new("a"),
            document_class: DocumentClass::new("brf"),
            document_id: DocumentId::new("d1"),
            round: 1,
            reason: "displaced".into(),
            deactivated_at: Utc::now(),
        };
        let promoted = snapshot(vec![LedgerEntry::GoldenPromoted(example.clone())]);
        assert_eq!(promoted.golden_set().len(), 1);
        let removed = snapshot(vec![
            LedgerEntry::GoldenPromoted(example),
            LedgerEntry::GoldenDeactivated(deactivation),
        ]);
        assert!(removed.golden_set().is_empty());
    }
}
