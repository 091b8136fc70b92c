//! State-gated delegation to specialists
//!
//! This module implements the turn-taking policy that routes each turn to
//! exactly one specialist while forbidding the same capability class on two
//! consecutive completed turns.

pub mod capability;
pub mod planner;
pub mod policy;
pub mod registry;
pub mod specialist;
pub mod state;

pub use capability::Capability;
pub use planner::{Decision, Planner, PlannerEvent, SpecialistInvoker, Turn, TurnOutcome};
pub use policy::{DelegationOutcome, DelegationRequest, PlannerPolicy, PolicyError, REFUSAL_REASON};
pub use registry::{Registry, RegistryError};
pub use specialist::Specialist;
pub use state::SessionState;
