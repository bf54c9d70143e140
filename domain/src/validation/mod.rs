//! Consistency checks across the combined output of a document's agents.
//!
//! Violations are warnings on the run record, never failures.

pub mod cross_validator;
pub mod rules;

pub use cross_validator::{CrossValidator, ValidationReport, ValidationWarning};
pub use rules::ValidationRule;
