//! Application layer for extraction-coach
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{EngineConfig, RetryPolicy};
pub use ports::{
    advisor::{AdvisoryError, CoachingAdvisor},
    ledger_store::{LedgerStore, StoreError},
    model_invoker::{InvokeError, InvokeRequest, ModelInvoker},
    progress::{NoProgress, ProgressNotifier},
    run_logger::{NoRunLogger, RunEvent, RunEventLogger},
    sectionizer::{SectionizeError, SectionizedDocument, Sectionizer},
};
pub use use_cases::agent_registry::AgentRegistry;
pub use use_cases::coach_agent::{AgentTask, CoachAgentUseCase, CoachError};
pub use use_cases::engine::EngineServices;
pub use use_cases::learning_status::LearningStatusUseCase;
pub use use_cases::retry::{RetryError, Retryable, call_with_retry};
pub use use_cases::run_batch::{RunBatchError, RunBatchUseCase};
pub use use_cases::run_document::{RunDocumentError, RunDocumentUseCase};
pub use use_cases::scheduler::{ScheduleOutcome, TaskFailure, TaskOutcome, execute_plan};
