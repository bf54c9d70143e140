//! Extraction agents.
//!
//! An agent is a named specialization: it owns a set of target sections, an
//! output schema and an evolving instruction. The static part lives in
//! [`AgentSpec`]; the mutable instruction history lives in [`Agent`] and only
//! changes through [`Agent::apply_decision`].

pub mod catalog;
pub mod entities;

pub use catalog::AgentCatalog;
pub use entities::{Agent, AgentSpec, Instruction, InstructionChange, InstructionHistory, PriorityTier};
