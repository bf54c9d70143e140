//! Golden example curation.
//!
//! Attempts scoring at or above the golden threshold are promoted into a
//! per (document class, agent) set capped at the top K by score. The set is
//! rebuilt from promotion and deactivation entries in the ledger.

pub mod curator;

pub use curator::{GoldenAction, GoldenCurator, GoldenDeactivation, GoldenExample, GoldenPolicy, GoldenSet};
