//! Three-tier section router.
//!
//! 1. **Exact**: the section name equals a declared target section.
//! 2. **Normalized**: after case and diacritic folding, the section name
//!    equals or contains (as whole words) a target, an alias or a
//!    configured synonym of either.
//! 3. **Keyword**: a keyword fragment occurs anywhere in the folded name.
//!    Only used for a section that no agent matched in tiers 1-2, or for an
//!    agent that matched no section in tiers 1-2.
//!
//! Sections matched by several agents go to all of them. Each agent's
//! extraction zone is the union of the pages of its matched sections.

use crate::agent::catalog::AgentCatalog;
use crate::agent::entities::PriorityTier;
use crate::core::ids::AgentId;
use crate::core::text::{contains_phrase, normalize};
use crate::document::Section;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Synonym groups: canonical term to alternative names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub synonyms: BTreeMap<String, Vec<String>>,
}

impl RouterConfig {
    /// English names of the main Swedish report sections.
    pub fn brf_default() -> Self {
        let groups: [(&str, &[&str]); 7] = [
            ("förvaltningsberättelse", &["directors report", "administration report"]),
            ("resultaträkning", &["income statement", "profit and loss"]),
            ("balansräkning", &["balance sheet", "statement of financial position"]),
            ("kassaflödesanalys", &["cash flow statement", "statement of cash flows"]),
            ("revisionsberättelse", &["auditors report", "audit report"]),
            ("flerårsöversikt", &["multi year overview", "five year summary"]),
            ("leverantörer", &["suppliers", "vendors", "service providers"]),
        ];
        Self {
            synonyms: groups
                .iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                .collect(),
        }
    }
}

/// How a section was matched. Lower is stronger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Normalized,
    Keyword,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionMatch {
    pub section: Section,
    pub tier: MatchTier,
}

/// One agent's routed work for a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub agent_id: AgentId,
    pub tier: PriorityTier,
    pub matches: Vec<SectionMatch>,
    /// Extraction zone.
    pub pages: BTreeSet<u32>,
}

impl Assignment {
    pub fn section_names(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.section.name.as_str()).collect()
    }

    pub fn strongest_match(&self) -> Option<MatchTier> {
        self.matches.iter().map(|m| m.tier).min()
    }
}

/// Router output, in agent declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoutingTable {
    pub assignments: Vec<Assignment>,
    /// Sections no agent matched.
    pub unmatched_sections: Vec<String>,
}

impl RoutingTable {
    pub fn get(&self, agent: &AgentId) -> Option<&Assignment> {
        self.assignments.iter().find(|a| &a.agent_id == agent)
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[derive(Debug, Clone)]
struct AgentMatcher {
    id: AgentId,
    tier: PriorityTier,
    targets: Vec<String>,
    phrases: Vec<String>,
    keywords: Vec<String>,
}

/// Routes sections to agents of a catalog.
#[derive(Debug, Clone)]
pub struct SectionRouter {
    matchers: Vec<AgentMatcher>,
}

impl SectionRouter {
    pub fn new(catalog: &AgentCatalog, config: &RouterConfig) -> Self {
        let groups: Vec<BTreeSet<String>> = config
            .synonyms
            .iter()
            .map(|(canonical, alternatives)| {
                std::iter::once(canonical)
                    .chain(alternatives)
                    .map(|s| normalize(s))
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .collect();

        let matchers = catalog
            .iter()
            .map(|spec| {
                let mut phrases: BTreeSet<String> = spec
                    .target_sections
                    .iter()
                    .chain(&spec.aliases)
                    .map(|s| normalize(s))
                    .filter(|s| !s.is_empty())
                    .collect();
                for group in &groups {
                    if group.iter().any(|g| phrases.contains(g)) {
                        phrases.extend(group.iter().cloned());
                    }
                }
                AgentMatcher {
                    id: spec.id.clone(),
                    tier: spec.tier,
                    targets: spec.target_sections.iter().map(|t| t.trim().to_string()).collect(),
                    phrases: phrases.into_iter().collect(),
                    keywords: spec
                        .keywords
                        .iter()
                        .map(|k| normalize(k))
                        .filter(|k| !k.is_empty())
                        .collect(),
                }
            })
            .collect();

        Self { matchers }
    }

    pub fn route(&self, sections: &[Section]) -> RoutingTable {
        let folded: Vec<String> = sections.iter().map(|s| normalize(&s.name)).collect();

        // Tiers 1 and 2
        let mut tiers: Vec<Vec<Option<MatchTier>>> = sections
            .iter()
            .zip(&folded)
            .map(|(section, name)| {
                self.matchers
                    .iter()
                    .map(|m| strong_match(m, section.name.trim(), name))
                    .collect()
            })
            .collect();

        let section_matched: Vec<bool> = tiers.iter().map(|row| row.iter().any(Option::is_some)).collect();
        let agent_matched: Vec<bool> = (0..self.matchers.len())
            .map(|j| tiers.iter().any(|row| row[j].is_some()))
            .collect();

        // Tier 3 only fills gaps
        for (i, name) in folded.iter().enumerate() {
            for (j, matcher) in self.matchers.iter().enumerate() {
                if tiers[i][j].is_some() || (section_matched[i] && agent_matched[j]) {
                    continue;
                }
                if matcher.keywords.iter().any(|k| name.contains(k.as_str())) {
                    tiers[i][j] = Some(MatchTier::Keyword);
                }
            }
        }

        let assignments = self
            .matchers
            .iter()
            .enumerate()
            .filter_map(|(j, matcher)| {
                let matches: Vec<SectionMatch> = sections
                    .iter()
                    .enumerate()
                    .filter_map(|(i, section)| {
                        tiers[i][j].map(|tier| SectionMatch {
                            section: section.clone(),
                            tier,
                        })
                    })
                    .collect();
                if matches.is_empty() {
                    return None;
                }
                let pages = matches.iter().flat_map(|m| m.section.pages.pages()).collect();
                Some(Assignment {
                    agent_id: matcher.id.clone(),
                    tier: matcher.tier,
                    matches,
                    pages,
                })
            })
            .collect();

        let unmatched_sections = sections
            .iter()
            .enumerate()
            .filter(|(i, _)| tiers[*i].iter().all(Option::is_none))
            .map(|(_, s)| s.name.clone())
            .collect();

        RoutingTable {
            assignments,
            unmatched_sections,
        }
    }
}

fn strong_match(matcher: &AgentMatcher, raw: &str, folded: &str) -> Option<MatchTier> {
    if matcher.targets.iter().any(|t| t == raw) {
        return Some(MatchTier::Exact);
    }
    if folded.is_empty() {
        return None;
    }
    matcher
        .phrases
        .iter()
        .any(|p| contains_phrase(folded, p))
        .then_some(MatchTier::Normalized)
}
