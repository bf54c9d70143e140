//! Strongly typed identifiers.
//!
//! Identifiers are thin wrappers around `String` so that a document id can
//! never be passed where an agent id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Stable identifier of a document (one unit of extraction work).
    DocumentId
);

string_id!(
    /// Identifier of a specialized extraction agent, e.g. `balance_sheet_agent`.
    AgentId
);

string_id!(
    /// Coarse document family the ledger is keyed by, e.g. `brf_annual_report`.
    ///
    /// Performance history is only compared within one class.
    DocumentClass
);

impl Default for DocumentClass {
    fn default() -> Self {
        Self::new("default")
    }
}
