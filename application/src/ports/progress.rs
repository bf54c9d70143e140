//! Progress notification port
//!
//! Defines the interface for reporting progress during a batch run.

use coach_domain::{AgentId, DocumentId, DocumentReport, PriorityTier};

/// Callback for progress updates
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (progress bars, plain log lines, etc.)
pub trait ProgressNotifier: Send + Sync {
    /// Called once the batch size is known
    fn on_run_start(&self, _documents: usize) {}

    /// Called when a document's agents have been routed and planned
    fn on_document_start(&self, document: &DocumentId, agents: usize);

    /// Called when a batch of agents is dispatched
    fn on_batch_start(&self, _document: &DocumentId, _tier: PriorityTier, _size: usize) {}

    /// Called when an agent's coaching session finishes
    fn on_agent_complete(&self, document: &DocumentId, agent: &AgentId, accuracy: Option<f64>);

    /// Called when a document finishes, whatever its status
    fn on_document_complete(&self, report: &DocumentReport);

    fn on_run_complete(&self) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ProgressNotifier for NoProgress {
    fn on_document_start(&self, _document: &DocumentId, _agents: usize) {}
    fn on_agent_complete(&self, _document: &DocumentId, _agent: &AgentId, _accuracy: Option<f64>) {}
    fn on_document_complete(&self, _report: &DocumentReport) {}
}
