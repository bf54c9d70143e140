//! Model invocation port
//!
//! Runs one agent instruction against the pages of its extraction zone and
//! returns the raw model output. Conforming that output to the agent schema
//! is the application's job, not the adapter's.

use crate::use_cases::retry::Retryable;
use async_trait::async_trait;
use coach_domain::{AgentId, DocumentId, ExtractionSchema, GoldenExample, Instruction, PageText};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during model invocation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvokeError {
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl Retryable for InvokeError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            InvokeError::Timeout(_) | InvokeError::RateLimited(_) | InvokeError::Unavailable(_)
        )
    }

    fn timed_out(after: Duration) -> Self {
        InvokeError::Timeout(after)
    }
}

/// Everything the model sees for one attempt.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub agent_id: AgentId,
    pub document_id: DocumentId,
    pub instruction: Instruction,
    pub schema: ExtractionSchema,
    /// Extraction zone pages only.
    pub pages: Vec<PageText>,
    /// Few-shot guidance.
    pub golden_examples: Vec<GoldenExample>,
}

#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Run the instruction and return the raw model output.
    async fn invoke(&self, request: &InvokeRequest) -> Result<String, InvokeError>;
}
