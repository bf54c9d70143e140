//! Port for structured run-event logging.
//!
//! Defines the [`RunEventLogger`] trait for recording the audit trail of a
//! run (attempts, decisions, rejected advice, golden promotions, failures).
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures the run in
//! a machine-readable format (JSONL).

use serde_json::Value;

/// A structured run event.
pub struct RunEvent {
    /// Event type identifier (e.g., "attempt_recorded", "decision_taken").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl RunEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Implementations write each event as a single record. Logging is
/// synchronous and infallible from the caller's point of view.
pub trait RunEventLogger: Send + Sync {
    fn log(&self, event: RunEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoRunLogger;

impl RunEventLogger for NoRunLogger {
    fn log(&self, _event: RunEvent) {}
}
