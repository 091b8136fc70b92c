//! Session state storage
//!
//! The planner reads and writes session state through [`SessionStore`]; the
//! backend is chosen by the host. Two backends ship with the crate: an
//! in-memory map and SQLite.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::delegation::SessionState;
use crate::error::{AppError, Result};

/// Load/store hooks for session state
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session's state, `None` if the session does not exist
    async fn load_state(&self, session_id: Uuid) -> Result<Option<SessionState>>;

    /// Insert or replace a session's state
    async fn store_state(&self, state: &SessionState) -> Result<()>;

    /// Insert a new session; returns false if it already exists
    async fn create_state(&self, state: &SessionState) -> Result<bool>;
}

/// Process-local store, lost on restart
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<Uuid, SessionState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_state(&self, session_id: Uuid) -> Result<Option<SessionState>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&session_id).cloned())
    }

    async fn store_state(&self, state: &SessionState) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(state.session_id(), state.clone());
        Ok(())
    }

    async fn create_state(&self, state: &SessionState) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&state.session_id()) {
            return Ok(false);
        }
        sessions.insert(state.session_id(), state.clone());
        Ok(true)
    }
}

/// SQLite-backed store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url`, creating the file if needed, and migrate
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Apply the embedded migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn load_state(&self, session_id: Uuid) -> Result<Option<SessionState>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, last_capability, delegations, created_at, updated_at
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(SessionState::try_from).transpose()
    }

    async fn store_state(&self, state: &SessionState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, last_capability, delegations, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                last_capability = excluded.last_capability,
                delegations = excluded.delegations,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(state.session_id().to_string())
        .bind(state.last_capability_used().map(|c| c.as_str().to_string()))
        .bind(delegations_to_db(state.delegations())?)
        .bind(state.created_at())
        .bind(state.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_state(&self, state: &SessionState) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO sessions (id, last_capability, delegations, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(state.session_id().to_string())
        .bind(state.last_capability_used().map(|c| c.as_str().to_string()))
        .bind(delegations_to_db(state.delegations())?)
        .bind(state.created_at())
        .bind(state.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

fn delegations_to_db(delegations: u64) -> Result<i64> {
    i64::try_from(delegations)
        .map_err(|_| AppError::Internal(format!("Delegation count overflow: {}", delegations)))
}

// Internal row type for sqlx

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    last_capability: Option<String>,
    delegations: i64,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl TryFrom<SessionRow> for SessionState {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self> {
        let session_id = Uuid::parse_str(&row.id)
            .map_err(|e| AppError::Internal(format!("Invalid UUID: {}", e)))?;
        let last_capability = row
            .last_capability
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| AppError::Internal(format!("Invalid capability: {}", e)))?;
        let delegations = u64::try_from(row.delegations)
            .map_err(|e| AppError::Internal(format!("Invalid delegation count: {}", e)))?;

        Ok(SessionState::restore(
            session_id,
            last_capability,
            delegations,
            row.created_at,
            row.updated_at,
        ))
    }
}
