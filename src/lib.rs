//! Waypoint - state-gated specialist delegation for multi-agent planners

pub mod api;
pub mod config;
pub mod delegation;
pub mod error;
pub mod store;

use std::sync::Arc;

use crate::delegation::Planner;

/// Application state shared across handlers
pub struct AppState {
    pub planner: Planner,
}

impl AppState {
    pub fn new(planner: Planner) -> Arc<Self> {
        Arc::new(Self { planner })
    }
}
