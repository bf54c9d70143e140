//! Logging infrastructure: the structured run-event audit trail.
//!
//! Provides [`JsonlRunLogger`], a JSONL file writer that implements the
//! [`RunEventLogger`](coach_application::RunEventLogger) port.

mod run_logger;

pub use run_logger::JsonlRunLogger;
