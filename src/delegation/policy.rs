//! Planner policy: the no-repeat delegation rule
//!
//! The policy decides whether a requested capability class may run this turn
//! and records completed delegations. A capability used on the previous
//! completed turn is banned; every other registered capability is open.
//!
//! `decide` is a pure read of [`SessionState`]. `commit` is the only
//! operation that mutates it and must run once per *completed* delegation,
//! never on refusals, failures or cancellations.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use super::capability::Capability;
use super::registry::Registry;
use super::specialist::Specialist;
use super::state::SessionState;

/// Reason attached to every refusal
pub const REFUSAL_REASON: &str = "capability banned this turn";

/// Errors raised by the policy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Unknown capability: {0}")]
    UnknownCapability(Capability),

    #[error("Invalid capability: {0:?}")]
    InvalidCapability(String),

    #[error("Specialist {name} is not registered for capability {capability}")]
    UnregisteredSpecialist { name: String, capability: Capability },
}

/// A capability class the caller wants served this turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationRequest {
    pub capability: Capability,
}

impl DelegationRequest {
    pub fn new(capability: Capability) -> Self {
        Self { capability }
    }

    /// Build a request from a raw capability name
    pub fn parse(raw: &str) -> Result<Self, PolicyError> {
        Ok(Self::new(raw.parse()?))
    }
}

impl From<Capability> for DelegationRequest {
    fn from(capability: Capability) -> Self {
        Self::new(capability)
    }
}

/// Result of a delegation decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DelegationOutcome {
    /// The request may be routed to this specialist
    Allowed { specialist: Specialist },
    /// The requested capability is banned this turn
    Refused {
        reason: String,
        banned: Capability,
        /// Open capabilities, in registration order
        alternatives: Vec<Capability>,
    },
}

impl DelegationOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, DelegationOutcome::Allowed { .. })
    }

    /// The specialist to activate, if allowed
    pub fn specialist(&self) -> Option<&Specialist> {
        match self {
            DelegationOutcome::Allowed { specialist } => Some(specialist),
            DelegationOutcome::Refused { .. } => None,
        }
    }

    /// Alternatives offered on refusal (empty when allowed)
    pub fn alternatives(&self) -> &[Capability] {
        match self {
            DelegationOutcome::Allowed { .. } => &[],
            DelegationOutcome::Refused { alternatives, .. } => alternatives,
        }
    }

    /// The single alternative to propose to the user first
    pub fn suggestion(&self) -> Option<&Capability> {
        self.alternatives().first()
    }
}

/// The delegation policy over a static registry
#[derive(Debug, Clone)]
pub struct PlannerPolicy {
    registry: Arc<Registry>,
}

impl PlannerPolicy {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Decide whether `request` may run given the session's history
    pub fn decide(
        &self,
        request: &DelegationRequest,
        state: &SessionState,
    ) -> Result<DelegationOutcome, PolicyError> {
        let specialist = self
            .registry
            .specialist_for(&request.capability)
            .ok_or_else(|| PolicyError::UnknownCapability(request.capability.clone()))?;

        let last = state.last_capability_used();
        if last != Some(&request.capability) {
            return Ok(DelegationOutcome::Allowed {
                specialist: specialist.clone(),
            });
        }

        let alternatives = self
            .registry
            .capabilities()
            .filter(|c| *c != &request.capability && Some(*c) != last)
            .cloned()
            .collect();

        Ok(DelegationOutcome::Refused {
            reason: REFUSAL_REASON.to_string(),
            banned: request.capability.clone(),
            alternatives,
        })
    }

    /// Record a completed delegation
    ///
    /// The specialist must be the one registered for its capability.
    /// Nothing is mutated on error.
    pub fn commit(
        &self,
        specialist: &Specialist,
        state: &mut SessionState,
    ) -> Result<(), PolicyError> {
        let registered = self
            .registry
            .specialist_for(&specialist.capability)
            .ok_or_else(|| PolicyError::UnknownCapability(specialist.capability.clone()))?;

        if registered.name != specialist.name {
            return Err(PolicyError::UnregisteredSpecialist {
                name: specialist.name.clone(),
                capability: specialist.capability.clone(),
            });
        }

        state.record_delegation(specialist.capability.clone());
        Ok(())
    }

    /// The specialist banned this turn, if any
    pub fn banned(&self, state: &SessionState) -> Option<&Specialist> {
        state
            .last_capability_used()
            .and_then(|c| self.registry.specialist_for(c))
    }

    /// Render the routing instruction for a generative planner
    ///
    /// Rebuilt from the registry and the session state on every call.
    pub fn instruction(&self, state: &SessionState) -> String {
        let mut lines = vec![
            "You are a Master Trip Planner dedicated to creating varied, balanced itineraries."
                .to_string(),
            String::new(),
            "### SPECIALISTS".to_string(),
        ];
        lines.extend(
            self.registry
                .specialists()
                .iter()
                .map(|s| format!("- `{}` handles {} requests.", s.name, s.capability)),
        );

        lines.push(String::new());
        lines.push("### STATE".to_string());
        let banned = self.banned(state);
        match state.last_capability_used() {
            Some(last) => lines.push(format!("The last activity type you planned was: {}", last)),
            None => lines.push(
                "No activity has been planned yet; you are free to choose any specialist."
                    .to_string(),
            ),
        }
        match banned {
            Some(s) => lines.push(format!(
                "`{}` ({}) is BANNED for this turn.",
                s.name, s.capability
            )),
            None => lines.push("No specialist is banned this turn.".to_string()),
        }

        let open: Vec<String> = self
            .registry
            .capabilities()
            .filter(|c| Some(*c) != state.last_capability_used())
            .map(|c| c.to_string())
            .collect();

        lines.push(String::new());
        lines.push("### RULES".to_string());
        lines.push(
            "1. Delegate every request to exactly one of the specialists above. Never answer directly."
                .to_string(),
        );
        lines.push(
            "2. Never use the same activity type on two consecutive turns.".to_string(),
        );
        if banned.is_some() {
            let suggestion = if open.is_empty() {
                "explain that no other activity type is available right now".to_string()
            } else {
                format!("suggest a different activity type instead: {}", open.join(", "))
            };
            lines.push(format!(
                "3. If the request fits the banned specialist, politely refuse and {}.",
                suggestion
            ));
        } else {
            lines.push("3. Any activity type may be chosen this turn.".to_string());
        }
        lines.push(
            "4. Transfer to ONE specialist at a time. Never call several specialists in a single turn."
                .to_string(),
        );

        lines.join("\n")
    }
}
