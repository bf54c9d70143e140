//! Domain layer for extraction-coach
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Coaching
//!
//! Every extraction attempt is scored by the [`QualityEvaluator`], recorded
//! in the performance ledger, and fed to the [`StrategySelector`], which
//! decides whether the agent's instruction is kept, reverted, refined or
//! replaced by an alternative approach.
//!
//! ## Learning phases
//!
//! How aggressively agents are coached depends on how many documents of a
//! class have been processed (Exploration, Optimization, Convergence,
//! Golden). The phase is always derived from a ledger snapshot, never stored.
//!
//! ## Routing and scheduling
//!
//! The [`SectionRouter`] assigns detected sections to agents, and the
//! [`ExecutionPlan`] orders those agents into priority tiers and
//! concurrency-bounded batches.

pub mod agent;
pub mod coaching;
pub mod config;
pub mod core;
pub mod document;
pub mod extraction;
pub mod golden;
pub mod learning;
pub mod quality;
pub mod report;
pub mod routing;
pub mod scheduling;
pub mod validation;

// Re-export commonly used types
pub use agent::{Agent, AgentCatalog, AgentSpec, Instruction, InstructionChange, InstructionHistory, PriorityTier};
pub use coaching::{
    AdvisoryContext, AdvisoryRejection, AdvisoryResponse, CoachingDecision, DecisionSource, SelectionInput,
    SelectorConfig, Strategy, StrategySelector, Verdict, parse_advisory_response,
};
pub use config::{ConfigIssue, ConfigIssueCode, Severity, has_errors};
pub use core::{
    error::DomainError,
    ids::{AgentId, DocumentClass, DocumentId},
};
pub use document::{Document, PageRange, PageText, Section, SectionKind};
pub use extraction::{
    AttemptKey, AttemptSummary, ExtractionAttempt, ExtractionPayload, ExtractionSchema, FieldKind, FieldSpec,
    FieldValue,
};
pub use golden::{GoldenAction, GoldenCurator, GoldenExample, GoldenPolicy, GoldenSet};
pub use learning::{
    DecisionRecord, DocumentCounter, LearningPhase, LedgerEntry, LedgerEntryKind, LedgerFilter,
    LedgerRecord, LedgerSnapshot, PerformanceRecord, PhaseClassifier, PhaseProfile, PhaseRounds,
    PhaseThresholds, RoundIndex, Trend,
};
pub use learning::{AgentStatus, ClassStatus, GoldenStatus, LearningStatus, SessionStatus, StatusOptions};
pub use quality::{EvaluationBasis, EvaluatorConfig, Metrics, QualityEvaluator};
pub use report::{AgentOutcome, DecisionSummary, DocumentReport, DocumentStatus, RunReport, RunSummary};
pub use routing::{Assignment, MatchTier, RouterConfig, RoutingTable, SectionMatch, SectionRouter};
pub use scheduling::{Batch, DEFAULT_CONCURRENCY_LIMIT, ExecutionPlan, TierStage};
pub use validation::{CrossValidator, ValidationReport, ValidationRule, ValidationWarning};
