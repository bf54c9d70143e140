//! Run reports surfaced to the operator.

pub mod run_report;

pub use run_report::{
    AgentOutcome, DecisionSummary, DocumentReport, DocumentStatus, RunReport, RunSummary,
};
