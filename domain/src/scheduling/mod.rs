//! Priority-tiered batch planning for one document's agents.

pub mod plan;

pub use plan::{Batch, DEFAULT_CONCURRENCY_LIMIT, ExecutionPlan, TierStage};
