//! Route progress snapshots

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Route;

/// Tracking state reported with each progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteProgressState {
    RouteInvalid,
    RouteInitialized,
    LocationTracking,
    RouteComplete,
    OffRoute,
    LocationStale,
    RouteUncertain,
}

/// Progress along the current leg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegProgress {
    pub leg_index: u32,
    pub step_index: u32,
}

/// Progress snapshot from the progress provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteProgress {
    /// Route this progress refers to
    pub route: Arc<Route>,

    pub current_state: RouteProgressState,

    /// Metres left to the destination
    pub distance_remaining: f32,

    /// Seconds left to the destination
    pub duration_remaining: f64,

    /// Metres already travelled on this route
    pub distance_traveled: f32,

    #[serde(default)]
    pub current_leg_progress: Option<LegProgress>,
}

impl RouteProgress {
    pub fn is_complete(&self) -> bool {
        self.current_state == RouteProgressState::RouteComplete
    }
}
