//! Signal sources that feed a running telemetry service

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::events::UserFeedback;
use crate::types::{LocationSample, NavigationSessionState, Route, RouteProgress};

/// One input to telemetry, as the host SDK would deliver it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum NavigationSignal {
    RawLocation(LocationSample),
    Progress(RouteProgress),
    RoutesChanged(Vec<Arc<Route>>),
    OffRoute(bool),
    RouteRequestFailed(String),
    SessionState(NavigationSessionState),
    Feedback(UserFeedback),
}

impl NavigationSignal {
    pub fn kind(&self) -> &'static str {
        match self {
            NavigationSignal::RawLocation(_) => "raw_location",
            NavigationSignal::Progress(_) => "progress",
            NavigationSignal::RoutesChanged(_) => "routes_changed",
            NavigationSignal::OffRoute(_) => "off_route",
            NavigationSignal::RouteRequestFailed(_) => "route_request_failed",
            NavigationSignal::SessionState(_) => "session_state",
            NavigationSignal::Feedback(_) => "feedback",
        }
    }
}

/// Trait for navigation signal sources
///
/// Providers handle their own timing: a replay sleeps until each recorded signal
/// is due, a live bridge waits on the host SDK.
#[async_trait::async_trait]
pub trait SignalProvider: Send + 'static {
    /// Get the next signal
    ///
    /// Returns:
    /// - `Ok(Some(signal))` - Signal available
    /// - `Ok(None)` - Source ended (normal termination)
    /// - `Err(e)` - Error occurred
    async fn next_signal(&mut self) -> Result<Option<NavigationSignal>>;
}
