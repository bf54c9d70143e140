//! Documents and their detected sections.
//!
//! Sections are produced by the external sectionizer and never mutated by
//! the engine. Page text is carried alongside so that an agent can be shown
//! only the pages of its extraction zone.

pub mod entities;
pub mod section;

pub use entities::{Document, PageText};
pub use section::{PageRange, Section, SectionKind};
