//! In-memory entity state registry

use super::{EntityLookup, EntityState};
use crate::error::Result;
use crate::utils::{safe_read, safe_write};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, info};

/// Entity states keyed by entity id
#[derive(Debug, Default)]
pub struct StateRegistry {
    states: RwLock<BTreeMap<String, EntityState>>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of states
    pub fn from_states<I: IntoIterator<Item = EntityState>>(states: I) -> Self {
        let registry = Self::new();
        for state in states {
            registry.set(state);
        }
        registry
    }

    /// Load states from a JSON array of `{entity_id, state, attributes}`
    pub async fn load_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path.as_ref()).await?;
        let states: Vec<EntityState> = serde_json::from_str(&contents)?;
        info!(
            "Loaded {} entity states from {:?}",
            states.len(),
            path.as_ref()
        );
        Ok(Self::from_states(states))
    }

    /// Insert or replace an entity state
    pub fn set(&self, state: EntityState) {
        debug!(entity_id = state.entity_id.as_str(), state = state.state.as_str(), "State set");
        safe_write(&self.states, "state registry").insert(state.entity_id.clone(), state);
    }

    /// Drop an entity, returning its last state
    pub fn remove(&self, entity_id: &str) -> Option<EntityState> {
        safe_write(&self.states, "state registry").remove(entity_id)
    }

    pub fn len(&self) -> usize {
        safe_read(&self.states, "state registry").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EntityLookup for StateRegistry {
    fn get(&self, entity_id: &str) -> Option<EntityState> {
        safe_read(&self.states, "state registry").get(entity_id).cloned()
    }

    fn all(&self) -> Vec<EntityState> {
        safe_read(&self.states, "state registry")
            .values()
            .cloned()
            .collect()
    }
}
