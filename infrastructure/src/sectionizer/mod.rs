//! Sectionizer adapters

mod json;

pub use json::JsonSectionizer;
