//! Turn coordinator around the planner policy
//!
//! The planner handles:
//! - Session creation and lookup through a [`SessionStore`]
//! - Per-session mutual exclusion for decide/invoke/commit
//! - Commit-after-completion semantics for specialist invocations
//! - Event broadcasting

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::capability::Capability;
use super::policy::{DelegationOutcome, DelegationRequest, PlannerPolicy};
use super::specialist::Specialist;
use super::state::SessionState;
use crate::error::{AppError, Result};
use crate::store::SessionStore;

/// Runs a specialist on behalf of the orchestrator
///
/// Implementations typically wrap an LLM call. Any error is treated as a
/// failed delegation and leaves the session state untouched.
#[async_trait]
pub trait SpecialistInvoker: Send + Sync {
    async fn invoke(&self, specialist: &Specialist, state: &SessionState) -> anyhow::Result<String>;
}

/// Events emitted by the planner
#[derive(Debug, Clone)]
pub enum PlannerEvent {
    /// A new session was created
    SessionOpened { session_id: Uuid },
    /// A delegation was allowed
    Allowed {
        session_id: Uuid,
        specialist: String,
        capability: Capability,
    },
    /// A delegation was refused
    Refused {
        session_id: Uuid,
        banned: Capability,
        alternatives: Vec<Capability>,
    },
    /// A completed delegation was recorded
    Committed {
        session_id: Uuid,
        capability: Capability,
        delegations: u64,
    },
    /// The specialist failed; nothing was recorded
    ExecutionFailed {
        session_id: Uuid,
        specialist: String,
        message: String,
    },
}

/// Permission to run one specialist, handed out by [`Planner::decide`]
///
/// `based_on` is the session's delegation count when the decision was made.
/// A turn can only be committed while the session is still at that count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub session_id: Uuid,
    pub specialist: Specialist,
    pub based_on: u64,
}

/// A decision made against stored session state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    Allowed {
        turn: Turn,
    },
    Refused {
        reason: String,
        banned: Capability,
        alternatives: Vec<Capability>,
    },
}

impl Decision {
    pub fn turn(&self) -> Option<&Turn> {
        match self {
            Decision::Allowed { turn } => Some(turn),
            Decision::Refused { .. } => None,
        }
    }
}

/// Result of a full decide/invoke/commit turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed {
        specialist: Specialist,
        output: String,
        state: SessionState,
    },
    Refused {
        reason: String,
        banned: Capability,
        alternatives: Vec<Capability>,
    },
}

type LockTable = StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>;

/// Holds one session's lock; the table entry goes away with the last holder
struct SessionGuard<'a> {
    locks: &'a LockTable,
    session_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        // Release first so our own Arc is no longer counted
        self.guard.take();

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = locks
            .get(&self.session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(&self.session_id);
        }
    }
}

/// Coordinates policy decisions over stored sessions
pub struct Planner {
    policy: PlannerPolicy,
    store: Arc<dyn SessionStore>,
    /// One lock per session in use; sessions never share a lock
    locks: LockTable,
    event_tx: broadcast::Sender<PlannerEvent>,
}

impl Planner {
    /// Create a new planner
    pub fn new(policy: PlannerPolicy, store: Arc<dyn SessionStore>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            policy,
            store,
            locks: StdMutex::new(HashMap::new()),
            event_tx,
        }
    }

    pub fn policy(&self) -> &PlannerPolicy {
        &self.policy
    }

    /// Subscribe to planner events
    pub fn subscribe(&self) -> broadcast::Receiver<PlannerEvent> {
        self.event_tx.subscribe()
    }

    /// Take the session's lock, creating its table entry on first use
    ///
    /// The entry is removed when the last guard or waiter for the session is
    /// dropped, so the table only holds sessions with a turn in flight.
    async fn lock_session(&self, session_id: Uuid) -> SessionGuard<'_> {
        let mut held = SessionGuard {
            locks: &self.locks,
            session_id,
            guard: None,
        };

        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(session_id).or_default().clone()
        };
        held.guard = Some(lock.lock_owned().await);

        held
    }

    async fn load(&self, session_id: Uuid) -> Result<SessionState> {
        self.store
            .load_state(session_id)
            .await?
            .ok_or(AppError::SessionNotFound(session_id))
    }

    /// Create a fresh session, with a random id unless one is given
    pub async fn open_session(&self, session_id: Option<Uuid>) -> Result<SessionState> {
        let session_id = session_id.unwrap_or_else(Uuid::new_v4);
        let _guard = self.lock_session(session_id).await;

        let state = SessionState::new(session_id);
        if !self.store.create_state(&state).await? {
            return Err(AppError::SessionExists(session_id));
        }

        tracing::info!(%session_id, "Session opened");
        let _ = self
            .event_tx
            .send(PlannerEvent::SessionOpened { session_id });

        Ok(state)
    }

    /// Get the stored state of a session
    pub async fn session(&self, session_id: Uuid) -> Result<SessionState> {
        self.load(session_id).await
    }

    /// Render the routing instruction for a session's current state
    pub async fn instruction(&self, session_id: Uuid) -> Result<String> {
        let state = self.load(session_id).await?;
        Ok(self.policy.instruction(&state))
    }

    /// Decide a request without running anything
    ///
    /// An allowed decision carries a [`Turn`] that must be passed to
    /// [`Planner::commit_turn`] once the specialist has completed. Dropping the
    /// turn leaves the session unchanged.
    pub async fn decide(&self, session_id: Uuid, request: &DelegationRequest) -> Result<Decision> {
        let _guard = self.lock_session(session_id).await;
        let state = self.load(session_id).await?;

        let decision = match self.policy.decide(request, &state)? {
            DelegationOutcome::Allowed { specialist } => {
                self.emit_allowed(session_id, &specialist);
                Decision::Allowed {
                    turn: Turn {
                        session_id,
                        specialist,
                        based_on: state.delegations(),
                    },
                }
            }
            DelegationOutcome::Refused {
                reason,
                banned,
                alternatives,
            } => {
                self.emit_refused(session_id, &banned, &alternatives);
                Decision::Refused {
                    reason,
                    banned,
                    alternatives,
                }
            }
        };

        Ok(decision)
    }

    /// Record a turn whose specialist has completed
    ///
    /// Fails with [`AppError::StaleTurn`] if another delegation was committed
    /// since the turn was decided, and with [`AppError::BannedCapability`] if
    /// the turn's capability is not open on the current state.
    pub async fn commit_turn(&self, turn: &Turn) -> Result<SessionState> {
        let session_id = turn.session_id;
        let _guard = self.lock_session(session_id).await;
        let mut state = self.load(session_id).await?;

        if state.delegations() != turn.based_on {
            tracing::warn!(
                %session_id,
                based_on = turn.based_on,
                current = state.delegations(),
                "Rejecting stale turn"
            );
            return Err(AppError::StaleTurn {
                session_id,
                based_on: turn.based_on,
                current: state.delegations(),
            });
        }

        let request = DelegationRequest::new(turn.specialist.capability.clone());
        if !self.policy.decide(&request, &state)?.is_allowed() {
            return Err(AppError::BannedCapability(request.capability));
        }

        self.commit(&turn.specialist, &mut state).await?;
        Ok(state)
    }

    /// Run a whole turn: decide, invoke the specialist, commit on success
    ///
    /// The session lock is held for the entire sequence. If the invoker fails,
    /// or this future is dropped before it returns, nothing is committed.
    pub async fn run_turn<I>(
        &self,
        session_id: Uuid,
        request: &DelegationRequest,
        invoker: &I,
    ) -> Result<TurnOutcome>
    where
        I: SpecialistInvoker + ?Sized,
    {
        let _guard = self.lock_session(session_id).await;
        let mut state = self.load(session_id).await?;

        let specialist = match self.policy.decide(request, &state)? {
            DelegationOutcome::Allowed { specialist } => specialist,
            DelegationOutcome::Refused {
                reason,
                banned,
                alternatives,
            } => {
                self.emit_refused(session_id, &banned, &alternatives);
                return Ok(TurnOutcome::Refused {
                    reason,
                    banned,
                    alternatives,
                });
            }
        };
        self.emit_allowed(session_id, &specialist);

        let output = match invoker.invoke(&specialist, &state).await {
            Ok(output) => output,
            Err(e) => {
                let message = format!("{:#}", e);
                tracing::error!(%session_id, specialist = %specialist.name, "Specialist failed: {}", message);
                let _ = self.event_tx.send(PlannerEvent::ExecutionFailed {
                    session_id,
                    specialist: specialist.name.clone(),
                    message: message.clone(),
                });
                return Err(AppError::SpecialistExecutionFailed {
                    specialist: specialist.name,
                    message,
                });
            }
        };

        self.commit(&specialist, &mut state).await?;

        Ok(TurnOutcome::Completed {
            specialist,
            output,
            state,
        })
    }

    /// Apply the policy commit and persist; caller holds the session lock
    async fn commit(&self, specialist: &Specialist, state: &mut SessionState) -> Result<()> {
        let mut next = state.clone();
        self.policy.commit(specialist, &mut next)?;
        self.store.store_state(&next).await?;
        *state = next;

        tracing::info!(
            session_id = %state.session_id(),
            capability = %specialist.capability,
            delegations = state.delegations(),
            "Delegation committed"
        );
        let _ = self.event_tx.send(PlannerEvent::Committed {
            session_id: state.session_id(),
            capability: specialist.capability.clone(),
            delegations: state.delegations(),
        });

        Ok(())
    }

    fn emit_allowed(&self, session_id: Uuid, specialist: &Specialist) {
        tracing::debug!(%session_id, specialist = %specialist.name, "Delegation allowed");
        let _ = self.event_tx.send(PlannerEvent::Allowed {
            session_id,
            specialist: specialist.name.clone(),
            capability: specialist.capability.clone(),
        });
    }

    fn emit_refused(&self, session_id: Uuid, banned: &Capability, alternatives: &[Capability]) {
        tracing::debug!(%session_id, %banned, "Delegation refused");
        let _ = self.event_tx.send(PlannerEvent::Refused {
            session_id,
            banned: banned.clone(),
            alternatives: alternatives.to_vec(),
        });
    }
}
