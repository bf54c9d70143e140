//! Core domain concepts shared across all subdomains.
//!
//! - [`ids`]: strongly typed identifiers (documents, agents, document classes)
//! - [`text`]: name normalization and UTF-8 safe truncation
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod ids;
pub mod text;
