//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod catalog;
mod engine;
mod learning;
mod provider;

pub use catalog::FileRouterConfig;
pub use engine::{FileEngineConfig, FileRetryConfig};
pub use learning::FilePhasesConfig;
pub use provider::FileProviderConfig;

use coach_application::EngineConfig;
use coach_domain::{
    AgentCatalog, AgentSpec, ConfigIssue, CrossValidator, EvaluatorConfig, GoldenCurator,
    GoldenPolicy, PhaseClassifier, QualityEvaluator, RouterConfig, SelectorConfig,
    StrategySelector, ValidationRule, has_errors,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Concurrency, history window, output files
    pub engine: FileEngineConfig,
    /// Backoff and timeouts of external services
    pub retry: FileRetryConfig,
    /// Phase thresholds and round budgets
    pub phases: FilePhasesConfig,
    /// Strategy selector tuning
    pub coaching: SelectorConfig,
    /// Quality evaluator tuning
    pub evaluation: EvaluatorConfig,
    /// Golden example promotion
    pub golden: GoldenPolicy,
    /// Section name synonyms
    pub router: FileRouterConfig,
    /// Model endpoint for extraction and advice
    pub provider: FileProviderConfig,
    /// Agent definitions, merged over the built-in catalog by id
    pub agents: Vec<AgentSpec>,
    /// Cross-validation rules, merged over the built-in rules by name
    pub validation: Vec<ValidationRule>,
}

/// The configuration contains at least one error-severity issue.
#[derive(Error, Debug)]
#[error("invalid configuration:\n{}", render(.0))]
pub struct ConfigValidationError(pub Vec<ConfigIssue>);

fn render(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Every section is checked; issues are never short-circuited so the
    /// user sees everything that is wrong at once.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        issues.extend(self.engine_config().validate());
        issues.extend(self.phase_classifier().validate());
        issues.extend(self.coaching.validate());
        issues.extend(self.evaluation.validate());
        issues.extend(self.golden.validate());
        issues.extend(self.provider.validate());

        let catalog = self.catalog();
        issues.extend(catalog.validate());
        for rule in catalog::build_rules(self.engine.builtin_rules, &self.validation) {
            issues.extend(rule.validate(&catalog));
        }

        issues
    }

    /// Fail on error-severity issues, returning the warnings otherwise.
    pub fn check(&self) -> Result<Vec<ConfigIssue>, ConfigValidationError> {
        let issues = self.validate();
        if has_errors(&issues) {
            Err(ConfigValidationError(
                issues.into_iter().filter(ConfigIssue::is_error).collect(),
            ))
        } else {
            Ok(issues)
        }
    }

    // ==================== Conversions ====================

    pub fn engine_config(&self) -> EngineConfig {
        self.engine.to_engine_config(&self.retry)
    }

    pub fn phase_classifier(&self) -> PhaseClassifier {
        self.phases.to_classifier()
    }

    pub fn selector(&self) -> StrategySelector {
        StrategySelector::new(self.coaching.clone())
    }

    pub fn evaluator(&self) -> QualityEvaluator {
        QualityEvaluator::new(self.evaluation.clone())
    }

    pub fn curator(&self) -> GoldenCurator {
        GoldenCurator::new(self.golden)
    }

    pub fn router_config(&self) -> RouterConfig {
        self.router.to_router_config()
    }

    pub fn catalog(&self) -> AgentCatalog {
        catalog::build_catalog(self.engine.builtin_agents, &self.agents)
    }

    pub fn validator(&self) -> CrossValidator {
        catalog::build_validator(self.engine.builtin_rules, &self.validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_domain::{AgentId, ConfigIssueCode, LearningPhase, PriorityTier};

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[engine]
agent_concurrency = 6
document_concurrency = 3
ledger_path = "ledger.jsonl"

[retry]
max_retries = 5
base_delay_ms = 250
invoke_timeout_secs = 60

[phases.thresholds]
exploration = 10
optimization = 20
convergence = 30

[phases.max_rounds]
exploration = 4

[golden]
threshold = 0.9
top_k = 5

[provider]
base_url = "http://localhost:8000/v1"
model = "qwen2.5-vl"
advisor = false

[[agents]]
id = "energy_agent"
tier = "supporting"
base_instruction = "Extract energy consumption."
target_sections = ["Energi"]

[[validation]]
kind = "min_cardinality"
name = "energy_present"
agent = "energy_agent"
field = "meters"
min = 1
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.agent_concurrency, 6);
        assert_eq!(config.engine.ledger_path.as_deref(), Some("ledger.jsonl"));
        assert_eq!(config.retry.max_retries, 5);
        assert!(!config.provider.advisor);

        let engine = config.engine_config();
        assert_eq!(engine.document_concurrency, 3);
        assert_eq!(engine.invoke_retry.timeout.as_secs(), 60);

        let classifier = config.phase_classifier();
        assert_eq!(classifier.classify(25), LearningPhase::Convergence);
        assert_eq!(classifier.profile(LearningPhase::Exploration).max_rounds, 4);
        // Unlisted keys keep their defaults
        assert_eq!(classifier.profile(LearningPhase::Golden).max_rounds, 1);

        let catalog = config.catalog();
        assert_eq!(catalog.len(), 17);
        let energy = catalog.get(&AgentId::new("energy_agent")).unwrap();
        assert_eq!(energy.tier, PriorityTier::Supporting);

        assert!(config.validate().iter().all(|i| !i.is_error()));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let toml_str = r#"
[engine]
history_window = 8
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.history_window, 8);
        // Defaults should apply
        assert_eq!(config.engine.agent_concurrency, 4);
        assert!(config.engine.builtin_agents);
        assert_eq!(config.golden, GoldenPolicy::default());
    }

    #[test]
    fn test_validate_default_config() {
        let config = FileConfig::default();
        assert!(config.validate().is_empty());
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_validate_collects_every_issue() {
        let toml_str = r#"
[engine]
agent_concurrency = 0

[phases.thresholds]
exploration = 100
optimization = 50

[golden]
threshold = 1.5

[provider]
model = ""
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let issues = config.validate();
        let codes: Vec<&ConfigIssueCode> = issues.iter().map(|i| &i.code).collect();
        assert!(codes.contains(&&ConfigIssueCode::ZeroConcurrency));
        assert!(codes.contains(&&ConfigIssueCode::PhaseThresholdsOutOfOrder));
        assert!(codes.contains(&&ConfigIssueCode::ThresholdOutOfRange));
        assert!(codes.contains(&&ConfigIssueCode::MissingProviderSetting));

        let err = config.check().unwrap_err();
        assert_eq!(err.0.len(), 4);
        assert!(err.to_string().contains("agent_concurrency"));
    }

    #[test]
    fn test_rule_referencing_unknown_agent_is_reported() {
        let toml_str = r#"
[[validation]]
kind = "min_cardinality"
name = "ghost"
agent = "ghost_agent"
field = "items"
min = 1
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.check().is_err());
    }

    #[test]
    fn test_builtin_sets_can_be_disabled() {
        let toml_str = r#"
[engine]
builtin_agents = false
builtin_rules = false

[[agents]]
id = "only_agent"
tier = "critical"
base_instruction = "Extract."
target_sections = ["Only"]
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.catalog().len(), 1);
        assert!(config.validator().rules().is_empty());
        assert!(config.check().is_ok());
    }
}
