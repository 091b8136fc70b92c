//! Static specialist registry
//!
//! The registry is built once at startup and never changes. Registration
//! order is significant: refusal alternatives are listed in that order.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use super::capability::Capability;
use super::specialist::Specialist;

/// Errors raised while building a registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry has no specialists")]
    Empty,

    #[error("Specialist name must not be empty")]
    EmptyName,

    #[error("Capability {0} is registered more than once")]
    DuplicateCapability(Capability),

    #[error("Specialist {0} is registered more than once")]
    DuplicateSpecialist(String),

    #[error("Failed to read registry file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse registry file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// On-disk registry layout
#[derive(Debug, Deserialize)]
struct RegistryFile {
    specialists: Vec<Specialist>,
}

/// An ordered set of specialists, one per capability class
#[derive(Debug, Clone)]
pub struct Registry {
    specialists: Vec<Specialist>,
}

impl Registry {
    /// Build a registry, validating that capabilities and names are unique
    pub fn new(specialists: Vec<Specialist>) -> Result<Self, RegistryError> {
        if specialists.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut capabilities = HashSet::new();
        let mut names = HashSet::new();
        for specialist in &specialists {
            if specialist.name.trim().is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if !capabilities.insert(&specialist.capability) {
                return Err(RegistryError::DuplicateCapability(
                    specialist.capability.clone(),
                ));
            }
            if !names.insert(specialist.name.as_str()) {
                return Err(RegistryError::DuplicateSpecialist(specialist.name.clone()));
            }
        }

        Ok(Self { specialists })
    }

    /// The museum / restaurant / outdoor trio used by the trip planner
    pub fn trip_planner() -> Self {
        Self {
            specialists: vec![
                Specialist::museum_expert(),
                Specialist::restaurant_expert(),
                Specialist::outdoor_expert(),
            ],
        }
    }

    /// Parse a registry from JSON: `{"specialists": [{"name": .., "capability": ..}]}`
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_json::from_str(json)?;
        Self::new(file.specialists)
    }

    /// Load a registry from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// All registered capability classes, in registration order
    pub fn registered_capabilities(&self) -> Vec<Capability> {
        self.capabilities().cloned().collect()
    }

    pub(crate) fn capabilities(&self) -> impl Iterator<Item = &Capability> {
        self.specialists.iter().map(|s| &s.capability)
    }

    /// Look up the specialist serving a capability class
    pub fn specialist_for(&self, capability: &Capability) -> Option<&Specialist> {
        self.specialists.iter().find(|s| &s.capability == capability)
    }

    pub fn contains(&self, capability: &Capability) -> bool {
        self.specialist_for(capability).is_some()
    }

    pub fn specialists(&self) -> &[Specialist] {
        &self.specialists
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::trip_planner()
    }
}
