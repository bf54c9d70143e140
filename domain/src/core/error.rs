//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("No agents configured")]
    NoAgents,

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Invalid page range {start}-{end}")]
    InvalidPageRange { start: u32, end: u32 },

    #[error("Instruction version {version} not found for agent {agent}")]
    UnknownInstructionVersion { agent: String, version: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_error_display() {
        let error = DomainError::Cancelled;
        assert_eq!(error.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_is_cancelled_check() {
        assert!(DomainError::Cancelled.is_cancelled());
        assert!(!DomainError::NoAgents.is_cancelled());
        assert!(!DomainError::UnknownAgent("x".to_string()).is_cancelled());
    }

    #[test]
    fn test_page_range_display() {
        let error = DomainError::InvalidPageRange { start: 9, end: 3 };
        assert_eq!(error.to_string(), "Invalid page range 9-3");
    }
}
