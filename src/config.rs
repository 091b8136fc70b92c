//! Command-line and environment configuration

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::delegation::{Registry, RegistryError};
use crate::error::Result;
use crate::store::{MemoryStore, SessionStore, SqliteStore};

/// `DATABASE_URL` value that selects the in-memory store
pub const MEMORY_DATABASE: &str = "memory";

#[derive(Debug, Parser)]
#[command(name = "waypoint")]
#[command(about = "State-gated specialist delegation for multi-agent planners")]
#[command(version)]
pub struct Cli {
    /// Session database (`sqlite:...`), or `memory` for a process-local store
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:waypoint.db",
        global = true
    )]
    pub database_url: String,

    /// JSON registry file; the built-in trip planner trio is used when absent
    #[arg(long, env = "WAYPOINT_REGISTRY", global = true)]
    pub registry: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = "WAYPOINT_BIND", default_value = "0.0.0.0:3000")]
        bind: SocketAddr,
    },

    /// Drive one session through a scripted list of requests
    Simulate {
        /// Requested capability for each turn, in order
        #[arg(short, long = "request", required = true)]
        requests: Vec<String>,
    },

    /// List the registered specialists
    Specialists,
}

impl Cli {
    /// Load the configured registry
    pub fn load_registry(&self) -> std::result::Result<Registry, RegistryError> {
        match &self.registry {
            Some(path) => {
                tracing::info!("Loading registry from {}", path.display());
                Registry::from_file(path)
            }
            None => Ok(Registry::trip_planner()),
        }
    }

    /// Open the configured session store
    pub async fn open_store(&self) -> Result<Arc<dyn SessionStore>> {
        if self.database_url == MEMORY_DATABASE {
            tracing::info!("Using in-memory session store");
            return Ok(Arc::new(MemoryStore::new()));
        }

        tracing::info!("Using session database {}", self.database_url);
        Ok(Arc::new(SqliteStore::connect(&self.database_url).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegation::Capability;

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["waypoint", "serve"]).unwrap();
        match cli.command {
            Command::Serve { bind } => assert_eq!(bind.port(), 3000),
            other => panic!("Expected Serve, got {:?}", other),
        }
        assert!(cli.registry.is_none());
    }

    #[test]
    fn test_parse_simulate_requests() {
        let cli = Cli::try_parse_from([
            "waypoint",
            "--database-url",
            "memory",
            "simulate",
            "--request",
            "cultural",
            "-r",
            "food",
        ])
        .unwrap();

        assert_eq!(cli.database_url, MEMORY_DATABASE);
        match cli.command {
            Command::Simulate { requests } => assert_eq!(requests, vec!["cultural", "food"]),
            other => panic!("Expected Simulate, got {:?}", other),
        }
    }

    #[test]
    fn test_simulate_requires_requests() {
        assert!(Cli::try_parse_from(["waypoint", "simulate"]).is_err());
    }

    #[test]
    fn test_default_registry() {
        let cli = Cli::try_parse_from(["waypoint", "specialists"]).unwrap();
        let registry = cli.load_registry().unwrap();
        assert!(registry.contains(&Capability::outdoor()));
    }

    #[test]
    fn test_missing_registry_file() {
        let cli = Cli::try_parse_from([
            "waypoint",
            "--registry",
            "/nonexistent/registry.json",
            "specialists",
        ])
        .unwrap();
        assert!(matches!(cli.load_registry(), Err(RegistryError::Io(_))));
    }

    #[tokio::test]
    async fn test_open_memory_store() {
        let cli = Cli::try_parse_from(["waypoint", "--database-url", "memory", "specialists"])
            .unwrap();
        let store = cli.open_store().await.unwrap();
        assert!(store.load_state(uuid::Uuid::new_v4()).await.unwrap().is_none());
    }
}
