//! Application-level configuration.
//!
//! This module provides configuration types that control how use cases behave:
//!
//! - [`EngineConfig`]: concurrency limits and coaching window
//! - [`RetryPolicy`]: timeouts and backoff for the external model and advisory services

pub mod engine_config;
pub mod retry_policy;

pub use engine_config::EngineConfig;
pub use retry_policy::RetryPolicy;
