//! Core value types shared by the buffers, dispatcher and session coordinator.
//!
//! These mirror what the host navigation SDK hands to its observers:
//! - [`LocationSample`] raw location fixes
//! - [`Route`] and its legs/steps, read-only
//! - [`RouteProgress`] progress snapshots with a [`RouteProgressState`]
//! - [`NavigationSessionState`] the host's session state machine input

mod location;
mod progress;
mod route;
mod session_state;

pub use location::LocationSample;
pub use progress::{LegProgress, RouteProgress, RouteProgressState};
pub use route::{LegStep, Point, Route, RouteLeg, RouteOptions};
pub use session_state::NavigationSessionState;
