//! Declarative cross-validation rules.
//!
//! Rules are data so they can be listed under `[[validation]]` in the
//! configuration file:
//!
//! ```toml
//! [[validation]]
//! kind = "sum_equals"
//! name = "balance_check"
//! agent = "balance_sheet_agent"
//! plus = ["total_equity", "total_liabilities"]
//! equals = "total_assets"
//! tolerance = 1000.0
//! ```

use crate::agent::catalog::AgentCatalog;
use crate::config::{ConfigIssue, ConfigIssueCode};
use crate::core::ids::AgentId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationRule {
    /// `sum(plus) - sum(minus) == equals` within one agent's payload.
    SumEquals {
        name: String,
        agent: AgentId,
        plus: Vec<String>,
        #[serde(default)]
        minus: Vec<String>,
        equals: String,
        #[serde(default)]
        tolerance: f64,
    },
    /// `sum(list[].item_field) == equals` within one agent's payload.
    ListSumEquals {
        name: String,
        agent: AgentId,
        list: String,
        item_field: String,
        equals: String,
        #[serde(default)]
        tolerance: f64,
    },
    /// A list field holds at least `min` entries.
    MinCardinality {
        name: String,
        agent: AgentId,
        field: String,
        min: usize,
    },
    /// Several agents report the same field with the same value.
    ///
    /// Without a tolerance the values are compared as text, ignoring case
    /// and surrounding whitespace.
    CrossAgentAgreement {
        name: String,
        field: String,
        agents: Vec<AgentId>,
        #[serde(default)]
        tolerance: Option<f64>,
    },
}

impl ValidationRule {
    pub fn name(&self) -> &str {
        match self {
            ValidationRule::SumEquals { name, .. }
            | ValidationRule::ListSumEquals { name, .. }
            | ValidationRule::MinCardinality { name, .. }
            | ValidationRule::CrossAgentAgreement { name, .. } => name,
        }
    }

    /// Agents whose output the rule reads.
    pub fn agents(&self) -> Vec<AgentId> {
        match self {
            ValidationRule::SumEquals { agent, .. }
            | ValidationRule::ListSumEquals { agent, .. }
            | ValidationRule::MinCardinality { agent, .. } => vec![agent.clone()],
            ValidationRule::CrossAgentAgreement { agents, .. } => agents.clone(),
        }
    }

    fn tolerance(&self) -> Option<f64> {
        match self {
            ValidationRule::SumEquals { tolerance, .. }
            | ValidationRule::ListSumEquals { tolerance, .. } => Some(*tolerance),
            ValidationRule::CrossAgentAgreement { tolerance, .. } => *tolerance,
            ValidationRule::MinCardinality { .. } => None,
        }
    }

    /// Check the rule is well formed and references catalog agents only.
    pub fn validate(&self, catalog: &AgentCatalog) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let name = self.name();

        for agent in self.agents() {
            if !catalog.contains(&agent) {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::UnknownAgentInRule,
                    format!("validation rule '{name}' references unknown agent '{agent}'"),
                ));
            }
        }

        if let Some(t) = self.tolerance()
            && !(t.is_finite() && t >= 0.0)
        {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidValidationRule,
                format!("validation rule '{name}' has invalid tolerance {t}"),
            ));
        }

        let malformed = match self {
            ValidationRule::SumEquals { plus, equals, .. } => plus.is_empty() || equals.is_empty(),
            ValidationRule::ListSumEquals {
                list, item_field, equals, ..
            } => list.is_empty() || item_field.is_empty() || equals.is_empty(),
            ValidationRule::MinCardinality { field, .. } => field.is_empty(),
            ValidationRule::CrossAgentAgreement { field, agents, .. } => {
                field.is_empty() || agents.len() < 2
            }
        };
        if malformed {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidValidationRule,
                format!("validation rule '{name}' is missing fields or agents"),
            ));
        }

        issues
    }

    /// Rules for BRF annual reports.
    pub fn brf_defaults() -> Vec<ValidationRule> {
        let fields = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        vec![
            ValidationRule::SumEquals {
                name: "balance_check".into(),
                agent: AgentId::new("balance_sheet_agent"),
                plus: fields(&["total_equity", "total_liabilities"]),
                minus: Vec::new(),
                equals: "total_assets".into(),
                tolerance: 1000.0,
            },
            ValidationRule::SumEquals {
                name: "cash_flow_check".into(),
                agent: AgentId::new("cash_flow_agent"),
                plus: fields(&["opening_cash", "total_cash_flow"]),
                minus: Vec::new(),
                equals: "closing_cash".into(),
                tolerance: 100.0,
            },
            ValidationRule::SumEquals {
                name: "income_check".into(),
                agent: AgentId::new("income_statement_agent"),
                plus: fields(&["total_revenues"]),
                minus: fields(&["total_costs"]),
                equals: "net_income".into(),
                tolerance: 1000.0,
            },
            ValidationRule::MinCardinality {
                name: "board_members_check".into(),
                agent: AgentId::new("governance_agent"),
                field: "board_members".into(),
                min: 3,
            },
            ValidationRule::ListSumEquals {
                name: "loan_total_check".into(),
                agent: AgentId::new("note_loans_agent"),
                list: "loans".into(),
                item_field: "amount".into(),
                equals: "total_loans".into(),
                tolerance: 1000.0,
            },
            ValidationRule::CrossAgentAgreement {
                name: "long_term_debt_agreement".into(),
                field: "long_term_debt".into(),
                agents: vec![
                    AgentId::new("balance_sheet_agent"),
                    AgentId::new("note_loans_agent"),
                ],
                tolerance: Some(1000.0),
            },
            ValidationRule::CrossAgentAgreement {
                name: "total_revenues_agreement".into(),
                field: "total_revenues".into(),
                agents: vec![
                    AgentId::new("income_statement_agent"),
                    AgentId::new("note_revenue_agent"),
                ],
                tolerance: Some(1000.0),
            },
            ValidationRule::CrossAgentAgreement {
                name: "property_designation_agreement".into(),
                field: "property_designation".into(),
                agents: vec![AgentId::new("property_agent"), AgentId::new("governance_agent")],
                tolerance: None,
            },
        ]
    }
}
