//! Advisory (coaching) service port
//!
//! The advisor returns raw text. Its answer is untrusted: the application
//! validates it with [`parse_advisory_response`](coach_domain::parse_advisory_response)
//! before anything is committed.

use crate::use_cases::retry::Retryable;
use async_trait::async_trait;
use coach_domain::AdvisoryContext;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdvisoryError {
    #[error("Advisory call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl Retryable for AdvisoryError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            AdvisoryError::Timeout(_) | AdvisoryError::RateLimited(_) | AdvisoryError::Unavailable(_)
        )
    }

    fn timed_out(after: Duration) -> Self {
        AdvisoryError::Timeout(after)
    }
}

#[async_trait]
pub trait CoachingAdvisor: Send + Sync {
    async fn advise(&self, context: &AdvisoryContext) -> Result<String, AdvisoryError>;
}
