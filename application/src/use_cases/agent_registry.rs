//! Live agents and their instruction histories.
//!
//! Every agent sits behind its own async mutex. A coaching session holds
//! the lock only while it decides and commits, so there is at most one
//! in-flight decision per agent even when several documents run at once.

use coach_domain::{Agent, AgentCatalog, AgentId, Instruction, LedgerSnapshot};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: HashMap<AgentId, Arc<Mutex<Agent>>>,
}

impl AgentRegistry {
    pub fn from_catalog(catalog: &AgentCatalog) -> Self {
        let agents = catalog
            .iter()
            .map(|spec| (spec.id.clone(), Arc::new(Mutex::new(Agent::new(spec.clone())))))
            .collect();
        Self { agents }
    }

    /// Replay instruction changes recorded in earlier runs.
    ///
    /// Changes for agents no longer in the catalog are ignored.
    pub async fn restore(&self, snapshot: &LedgerSnapshot) -> usize {
        let mut replayed = 0;
        for change in snapshot.instruction_changes() {
            if let Some(agent) = self.agents.get(&change.agent_id) {
                agent.lock().await.replay(change);
                replayed += 1;
            }
        }
        debug!("Replayed {} instruction changes", replayed);
        replayed
    }

    pub fn get(&self, id: &AgentId) -> Option<Arc<Mutex<Agent>>> {
        self.agents.get(id).cloned()
    }

    pub async fn current_instruction(&self, id: &AgentId) -> Option<Instruction> {
        let agent = self.agents.get(id)?;
        Some(agent.lock().await.current_instruction().clone())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
