//! Agent registry - identifier → agent mapping

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::agent::{Agent, AgentHandle};
use crate::error::{OrchestratorError, Result};
use crate::types::AgentId;

/// Read-mostly mapping from agent id to agent.
///
/// Registration takes the write lock; lookups share the read lock, so
/// cascades keep resolving agents while a registration is in progress.
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<AgentId, AgentHandle>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the agent under its own id
    pub fn register(&self, agent: impl Agent + 'static) -> AgentId {
        self.register_handle(AgentHandle::new(agent))
    }

    pub fn register_handle(&self, handle: AgentHandle) -> AgentId {
        let id = handle.id();
        let replaced = self.agents.write().insert(id.clone(), handle).is_some();
        info!(agent = %id, replaced, "Registered agent");
        id
    }

    /// Remove an agent. Returns whether it was present.
    pub fn deregister(&self, id: &AgentId) -> bool {
        let removed = self.agents.write().remove(id).is_some();
        debug!(agent = %id, removed, "Deregistered agent");
        removed
    }

    pub fn get(&self, id: &AgentId) -> Result<AgentHandle> {
        self.agents
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| OrchestratorError::AgentNotFound(id.clone()))
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.read().contains_key(id)
    }

    /// Declared tags of an agent, empty when unknown
    pub fn capabilities_of(&self, id: &AgentId) -> BTreeSet<String> {
        self.agents
            .read()
            .get(id)
            .map(|agent| agent.capabilities())
            .unwrap_or_default()
    }

    /// Snapshot of every agent's capabilities
    pub fn capabilities(&self) -> BTreeMap<AgentId, BTreeSet<String>> {
        self.agents
            .read()
            .iter()
            .map(|(id, agent)| (id.clone(), agent.capabilities()))
            .collect()
    }

    /// Registered ids in sorted order
    pub fn ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.read().is_empty()
    }
}
