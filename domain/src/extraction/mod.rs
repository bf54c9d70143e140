//! Extraction payloads and attempts.
//!
//! Raw model output is untyped JSON. Before it is scored or stored it is
//! conformed against the agent's [`ExtractionSchema`], so that rounds of the
//! same agent are always compared field by field on the same shape.
//! Fields the schema does not know land in an explicit `extra` bucket.

pub mod attempt;
pub mod parsing;
pub mod payload;
pub mod schema;

pub use attempt::{AttemptKey, AttemptSummary, ExtractionAttempt};
pub use parsing::{extract_json_object, parse_number};
pub use payload::{ExtractionPayload, FieldValue};
pub use schema::{
    Conformed, ExtractionSchema, FieldKind, FieldSpec, SchemaViolation, ValueRange, ViolationKind,
};
