//! Catalog configuration from TOML (`[router]`, `[[agents]]`, `[[validation]]`)

use coach_domain::{AgentCatalog, AgentSpec, CrossValidator, RouterConfig, ValidationRule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw router configuration from TOML
///
/// # Example
///
/// ```toml
/// [router]
/// builtin_synonyms = true
///
/// [router.synonyms]
/// "noter" = ["notes", "notes to the financial statements"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRouterConfig {
    pub builtin_synonyms: bool,
    pub synonyms: BTreeMap<String, Vec<String>>,
}

impl Default for FileRouterConfig {
    fn default() -> Self {
        Self {
            builtin_synonyms: true,
            synonyms: BTreeMap::new(),
        }
    }
}

impl FileRouterConfig {
    /// Configured groups extend (or replace, by canonical term) the built-in ones.
    pub fn to_router_config(&self) -> RouterConfig {
        let mut config = if self.builtin_synonyms {
            RouterConfig::brf_default()
        } else {
            RouterConfig::default()
        };
        config
            .synonyms
            .extend(self.synonyms.iter().map(|(k, v)| (k.clone(), v.clone())));
        config
    }
}

/// Built-in catalog (optional) merged with `[[agents]]` entries by id.
pub fn build_catalog(builtin: bool, agents: &[AgentSpec]) -> AgentCatalog {
    let base = if builtin {
        AgentCatalog::brf_default()
    } else {
        AgentCatalog::new(Vec::new())
    };
    base.merge(agents.iter().cloned())
}

/// Built-in rules (optional) with `[[validation]]` entries replacing by name.
pub fn build_rules(builtin: bool, rules: &[ValidationRule]) -> Vec<ValidationRule> {
    let mut merged: Vec<ValidationRule> = if builtin {
        ValidationRule::brf_defaults()
    } else {
        Vec::new()
    };
    for rule in rules {
        match merged.iter_mut().find(|r| r.name() == rule.name()) {
            Some(existing) => *existing = rule.clone(),
            None => merged.push(rule.clone()),
        }
    }
    merged
}

pub fn build_validator(builtin: bool, rules: &[ValidationRule]) -> CrossValidator {
    CrossValidator::new(build_rules(builtin, rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_domain::{AgentId, PriorityTier};

    #[test]
    fn test_router_synonyms_extend_builtin() {
        let mut config = FileRouterConfig::default();
        config
            .synonyms
            .insert("noter".into(), vec!["notes".into()]);
        let router = config.to_router_config();
        assert!(router.synonyms.contains_key("balansräkning"));
        assert_eq!(router.synonyms["noter"], vec!["notes".to_string()]);
    }

    #[test]
    fn test_catalog_override_by_id() {
        let custom = AgentSpec::new("balance_sheet_agent", PriorityTier::Critical, "Custom instruction.")
            .with_targets(["Balansräkning"]);
        let catalog = build_catalog(true, &[custom]);
        assert_eq!(catalog.len(), 16);
        let spec = catalog.get(&AgentId::new("balance_sheet_agent")).unwrap();
        assert_eq!(spec.base_instruction, "Custom instruction.");

        let only_custom = build_catalog(false, &[spec.clone()]);
        assert_eq!(only_custom.len(), 1);
    }

    #[test]
    fn test_rules_replace_by_name() {
        let stricter = ValidationRule::MinCardinality {
            name: "board_members_check".into(),
            agent: AgentId::new("governance_agent"),
            field: "board_members".into(),
            min: 5,
        };
        let rules = build_rules(true, &[stricter.clone()]);
        assert_eq!(rules.len(), ValidationRule::brf_defaults().len());
        assert!(rules.contains(&stricter));
        assert_eq!(build_rules(false, &[]).len(), 0);
    }
}
