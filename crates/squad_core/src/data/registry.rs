//! Registry of agent archetypes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::AgentConfig;
use crate::error::{GameError, Result};

/// Handle to a registered [`AgentConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigId(pub u32);

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config#{}", self.0)
    }
}

/// Immutable archetypes, registered once and shared by every agent
/// spawned from them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigRegistry {
    configs: HashMap<ConfigId, AgentConfig>,
    by_name: HashMap<String, ConfigId>,
    next_id: u32,
}

impl ConfigRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register an archetype.
    ///
    /// Registering a second archetype under an existing name replaces the
    /// name lookup but keeps the earlier id valid.
    ///
    /// # Errors
    ///
    /// Returns the validation error if the archetype is unusable.
    pub fn register(&mut self, config: AgentConfig) -> Result<ConfigId> {
        config.validate()?;
        let id = ConfigId(self.next_id);
        self.next_id += 1;
        self.by_name.insert(config.name.clone(), id);
        self.configs.insert(id, config);
        Ok(id)
    }

    /// Look up an archetype.
    #[must_use]
    pub fn get(&self, id: ConfigId) -> Option<&AgentConfig> {
        self.configs.get(&id)
    }

    /// Look up an archetype, failing with [`GameError::ConfigurationMissing`].
    ///
    /// # Errors
    ///
    /// Returns an error if nothing is registered under `id`.
    pub fn require(&self, id: ConfigId) -> Result<&AgentConfig> {
        self.get(id)
            .ok_or_else(|| GameError::ConfigurationMissing(id.to_string()))
    }

    /// Find an archetype id by name.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<ConfigId> {
        self.by_name.get(name).copied()
    }

    /// Number of registered archetypes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Fixed;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ConfigRegistry::new();
        let id = registry.register(AgentConfig::new("archer")).unwrap();
        assert_eq!(registry.get(id).unwrap().name, "archer");
        assert_eq!(registry.id_of("archer"), Some(id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_require_missing_is_configuration_missing() {
        let registry = ConfigRegistry::new();
        assert!(matches!(
            registry.require(ConfigId(3)),
            Err(GameError::ConfigurationMissing(_))
        ));
    }

    #[test]
    fn test_invalid_config_is_not_registered() {
        let mut registry = ConfigRegistry::new();
        let mut config = AgentConfig::new("broken");
        config.stats.max_health = Fixed::ZERO;
        assert!(registry.register(config).is_err());
        assert!(registry.is_empty());
    }
}
