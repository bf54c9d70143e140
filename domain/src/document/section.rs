//! Section value objects.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Layout kind of a detected section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    #[default]
    Text,
    Table,
}

/// Inclusive, 1-indexed page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    /// Create a validated range (`1 <= start <= end`).
    pub fn new(start: u32, end: u32) -> Result<Self, DomainError> {
        if start == 0 || start > end {
            return Err(DomainError::InvalidPageRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A range covering exactly one page.
    pub fn single(page: u32) -> Result<Self, DomainError> {
        Self::new(page, page)
    }

    pub fn pages(&self) -> std::ops::RangeInclusive<u32> {
        self.start..=self.end
    }

    /// Number of pages covered.
    pub fn page_count(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    pub fn contains(&self, page: u32) -> bool {
        (self.start..=self.end).contains(&page)
    }

    /// The part of this range on or before `last_page`, if any.
    pub fn clamp_to(&self, last_page: u32) -> Option<PageRange> {
        if self.start > last_page {
            return None;
        }
        Some(Self {
            start: self.start,
            end: self.end.min(last_page),
        })
    }
}

impl std::fmt::Display for PageRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "p.{}", self.start)
        } else {
            write!(f, "pp.{}-{}", self.start, self.end)
        }
    }
}

/// A detected document section: `{name, page_range, kind}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub pages: PageRange,
    #[serde(default)]
    pub kind: SectionKind,
}

impl Section {
    pub fn new(name: impl Into<String>, pages: PageRange, kind: SectionKind) -> Self {
        Self {
            name: name.into(),
            pages,
            kind,
        }
    }

    pub fn text(name: impl Into<String>, pages: PageRange) -> Self {
        Self::new(name, pages, SectionKind::Text)
    }

    pub fn table(name: impl Into<String>, pages: PageRange) -> Self {
        Self::new(name, pages, SectionKind::Table)
    }
}
