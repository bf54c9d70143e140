//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod agent_registry;
pub mod coach_agent;
pub mod engine;
pub mod learning_status;
pub mod retry;
pub mod run_batch;
pub mod run_document;
pub mod scheduler;
#[cfg(test)]
pub(crate) mod test_support;
