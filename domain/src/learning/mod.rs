//! Learning state derived from the performance ledger.
//!
//! - [`ledger`]: append-only entries, filters and consistent snapshots
//! - [`performance`]: best-ever, recent window and trend per (class, agent)
//! - [`phase`]: learning phase as a pure function of document counts
//! - [`status`]: operator summary of a snapshot

pub mod ledger;
pub mod performance;
pub mod phase;
pub mod status;

pub use ledger::{
    DecisionRecord, DocumentCounter, InstructionChangeRecord, LedgerEntry, LedgerEntryKind,
    LedgerFilter, LedgerRecord, LedgerSnapshot, RoundIndex, RoundViolation,
};
pub use performance::{PerformanceRecord, Trend};
pub use phase::{LearningPhase, PhaseClassifier, PhaseProfile, PhaseRounds, PhaseThresholds};
pub use status::{AgentStatus, ClassStatus, GoldenStatus, LearningStatus, SessionStatus, StatusOptions};
