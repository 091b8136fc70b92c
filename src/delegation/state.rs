//! Per-session delegation state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::capability::Capability;

/// Mutable record kept for each conversation
///
/// `last_capability_used` only ever reflects a *completed* delegation. The
/// fields are read-only outside the crate; the policy's `commit` is the one
/// place that advances them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    session_id: Uuid,
    last_capability_used: Option<Capability>,
    delegations: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionState {
    /// Create a fresh state for a session
    pub fn new(session_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            last_capability_used: None,
            delegations: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a state from storage
    pub(crate) fn restore(
        session_id: Uuid,
        last_capability_used: Option<Capability>,
        delegations: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            last_capability_used,
            delegations,
            created_at,
            updated_at,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Capability class of the most recently completed delegation
    pub fn last_capability_used(&self) -> Option<&Capability> {
        self.last_capability_used.as_ref()
    }

    /// Number of completed delegations; also the state's version
    pub fn delegations(&self) -> u64 {
        self.delegations
    }

    /// True before the first completed delegation
    pub fn is_fresh(&self) -> bool {
        self.last_capability_used.is_none()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub(super) fn record_delegation(&mut self, capability: Capability) {
        self.last_capability_used = Some(capability);
        self.delegations += 1;
        self.updated_at = Utc::now();
    }
}
