//! Observer traits between the host navigation SDK and telemetry
//!
//! The host owns the signal sources. Telemetry registers itself through a
//! [`NavigationObservable`] and unregisters with the same handles on teardown;
//! the host compares handles with [`Arc::ptr_eq`].

use std::sync::Arc;

use crate::types::{LocationSample, NavigationSessionState, Route, RouteProgress};

/// Receives raw and map-matched locations.
pub trait LocationObserver: Send + Sync {
    fn on_raw_location_changed(&self, location: &LocationSample);

    /// Map-matched locations. Telemetry only records raw fixes.
    fn on_enhanced_location_changed(
        &self,
        _location: &LocationSample,
        _key_points: &[LocationSample],
    ) {
    }
}

pub trait RouteProgressObserver: Send + Sync {
    fn on_route_progress_changed(&self, progress: &RouteProgress);
}

pub trait RoutesObserver: Send + Sync {
    /// Full list of active routes; the first one is the primary route.
    fn on_routes_changed(&self, routes: &[Arc<Route>]);
}

pub trait OffRouteObserver: Send + Sync {
    fn on_off_route_state_changed(&self, off_route: bool);
}

pub trait SessionStateObserver: Send + Sync {
    fn on_session_state_changed(&self, state: NavigationSessionState);
}

/// Registration surface implemented by the host navigation SDK.
pub trait NavigationObservable {
    fn register_route_progress_observer(&self, observer: Arc<dyn RouteProgressObserver>);
    fn unregister_route_progress_observer(&self, observer: &Arc<dyn RouteProgressObserver>);

    fn register_location_observer(&self, observer: Arc<dyn LocationObserver>);
    fn unregister_location_observer(&self, observer: &Arc<dyn LocationObserver>);

    fn register_routes_observer(&self, observer: Arc<dyn RoutesObserver>);
    fn unregister_routes_observer(&self, observer: &Arc<dyn RoutesObserver>);

    fn register_off_route_observer(&self, observer: Arc<dyn OffRouteObserver>);
    fn unregister_off_route_observer(&self, observer: &Arc<dyn OffRouteObserver>);

    fn register_session_state_observer(&self, observer: Arc<dyn SessionStateObserver>);
    fn unregister_session_state_observer(&self, observer: &Arc<dyn SessionStateObserver>);
}
