//! Section routing: which agents see which sections.

pub mod router;

pub use router::{Assignment, MatchTier, RouterConfig, RoutingTable, SectionMatch, SectionRouter};
