//! Document entity.

use super::section::Section;
use crate::core::ids::{DocumentClass, DocumentId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Text of one page, as produced by the external layout extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

impl PageText {
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

/// A sectionized document ready for routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    #[serde(default)]
    pub class: DocumentClass,
    pub sections: Vec<Section>,
    #[serde(default)]
    pub pages: Vec<PageText>,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>, class: DocumentClass, sections: Vec<Section>) -> Self {
        Self {
            id: id.into(),
            class,
            sections,
            pages: Vec::new(),
        }
    }

    pub fn with_pages(mut self, pages: Vec<PageText>) -> Self {
        self.pages = pages;
        self
    }

    /// Highest page number the document has text for.
    pub fn last_page(&self) -> Option<u32> {
        self.pages.iter().map(|p| p.number).max()
    }

    /// Pages belonging to an extraction zone, in page order.
    ///
    /// Zone pages the document has no text for are skipped.
    pub fn zone_pages(&self, zone: &BTreeSet<u32>) -> Vec<PageText> {
        let mut pages: Vec<PageText> = self
            .pages
            .iter()
            .filter(|p| zone.contains(&p.number))
            .cloned()
            .collect();
        pages.sort_by_key(|p| p.number);
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::section::PageRange;

    #[test]
    fn test_zone_pages_filters_and_orders() {
        let doc = Document::new(
            "doc-1",
            DocumentClass::default(),
            vec![Section::text("Noter", PageRange::new(2, 3).unwrap())],
        )
        .with_pages(vec![
            PageText::new(3, "three"),
            PageText::new(1, "one"),
            PageText::new(2, "two"),
        ]);

        assert_eq!(doc.last_page(), Some(3));
        let zone: BTreeSet<u32> = [2, 3, 7].into_iter().collect();
        let pages = doc.zone_pages(&zone);
        assert_eq!(
            pages.iter().map(|p| p.number).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }
}
