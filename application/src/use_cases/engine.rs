//! Shared collaborators of the run use cases.

use crate::config::EngineConfig;
use crate::ports::advisor::CoachingAdvisor;
use crate::ports::ledger_store::LedgerStore;
use crate::ports::model_invoker::ModelInvoker;
use crate::ports::run_logger::{NoRunLogger, RunEventLogger};
use crate::use_cases::agent_registry::AgentRegistry;
use coach_domain::{
    AgentCatalog, CrossValidator, GoldenCurator, PhaseClassifier, QualityEvaluator, RouterConfig,
    SectionRouter, StrategySelector,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Ports and domain services used by a coaching run.
///
/// Cheap to clone; everything is behind an `Arc`.
#[derive(Clone)]
pub struct EngineServices {
    pub invoker: Arc<dyn ModelInvoker>,
    pub advisor: Option<Arc<dyn CoachingAdvisor>>,
    pub store: Arc<dyn LedgerStore>,
    pub logger: Arc<dyn RunEventLogger>,
    pub agents: Arc<AgentRegistry>,
    pub evaluator: Arc<QualityEvaluator>,
    pub selector: Arc<StrategySelector>,
    pub classifier: PhaseClassifier,
    pub router: Arc<SectionRouter>,
    pub validator: Arc<CrossValidator>,
    pub curator: GoldenCurator,
    /// Serializes golden curation so top-K holds across concurrent documents.
    pub golden_gate: Arc<Mutex<()>>,
    pub config: Arc<EngineConfig>,
}

impl EngineServices {
    pub fn new(
        invoker: Arc<dyn ModelInvoker>,
        store: Arc<dyn LedgerStore>,
        catalog: &AgentCatalog,
    ) -> Self {
        Self {
            invoker,
            advisor: None,
            store,
            logger: Arc::new(NoRunLogger),
            agents: Arc::new(AgentRegistry::from_catalog(catalog)),
            evaluator: Arc::new(QualityEvaluator::default()),
            selector: Arc::new(StrategySelector::default()),
            classifier: PhaseClassifier::default(),
            router: Arc::new(SectionRouter::new(catalog, &RouterConfig::brf_default())),
            validator: Arc::new(CrossValidator::default()),
            curator: GoldenCurator::default(),
            golden_gate: Arc::new(Mutex::new(())),
            config: Arc::new(EngineConfig::default()),
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_advisor(mut self, advisor: Arc<dyn CoachingAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn RunEventLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_evaluator(mut self, evaluator: QualityEvaluator) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    pub fn with_selector(mut self, selector: StrategySelector) -> Self {
        self.selector = Arc::new(selector);
        self
    }

    pub fn with_classifier(mut self, classifier: PhaseClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_router(mut self, router: SectionRouter) -> Self {
        self.router = Arc::new(router);
        self
    }

    pub fn with_validator(mut self, validator: CrossValidator) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn with_curator(mut self, curator: GoldenCurator) -> Self {
        self.curator = curator;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Size of the performance window used for decisions.
    pub fn performance_window(&self) -> usize {
        performance_window(&self.config, &self.selector)
    }
}

/// The window must cover the selector's plateau check.
pub fn performance_window(config: &EngineConfig, selector: &StrategySelector) -> usize {
    config.history_window.max(selector.config().stuck_window)
}
