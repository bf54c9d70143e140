//! Learning configuration from TOML (`[phases]` section)

use coach_domain::{PhaseClassifier, PhaseRounds, PhaseThresholds};
use serde::{Deserialize, Serialize};

/// Raw phase configuration from TOML
///
/// # Example
///
/// ```toml
/// [phases.thresholds]          # inclusive upper bounds, in documents
/// exploration = 50
/// optimization = 150
/// convergence = 200
///
/// [phases.max_rounds]          # coaching rounds per document and agent
/// exploration = 5
/// optimization = 3
/// convergence = 2
/// golden = 1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePhasesConfig {
    pub thresholds: PhaseThresholds,
    pub max_rounds: PhaseRounds,
}

impl FilePhasesConfig {
    pub fn to_classifier(&self) -> PhaseClassifier {
        PhaseClassifier::new(self.thresholds, self.max_rounds)
    }
}
