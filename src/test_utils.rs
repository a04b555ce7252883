//! Test utilities: sample builders, a recording reporter and a fake host SDK
//!
//! Available to unit tests and, with the `benchmark` feature, to benches.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::events::MetricEvent;
use crate::observer::{
    LocationObserver, NavigationObservable, OffRouteObserver, RouteProgressObserver,
    RoutesObserver, SessionStateObserver,
};
use crate::reporter::MetricsReporter;
use crate::types::{
    LegProgress, LegStep, LocationSample, Point, Route, RouteLeg, RouteOptions, RouteProgress,
    RouteProgressState,
};

/// Raw location `i`, a few metres further east for each step.
pub fn location(i: i64) -> LocationSample {
    LocationSample::new(i, 52.52, 13.40 + i as f64 * 1e-4).with_motion(12.5, 90.0)
}

/// Two-step route of `distance` metres towards a fixed destination.
pub fn route(distance: f64) -> Arc<Route> {
    let step = |latitude, longitude| LegStep {
        maneuver_location: Point::new(latitude, longitude),
        distance: distance / 2.0,
        duration: distance / 20.0,
    };
    Arc::new(Route {
        geometry: format!("geometry-{distance}"),
        distance,
        duration: distance / 10.0,
        legs: vec![RouteLeg { steps: vec![step(52.52, 13.40), step(52.53, 13.42)] }],
        route_index: Some(0),
        options: Some(RouteOptions {
            profile: Some("driving-traffic".to_string()),
            request_uuid: Some(format!("request-{distance}")),
        }),
    })
}

/// Progress halfway along `route`.
pub fn progress(route: &Arc<Route>, state: RouteProgressState) -> RouteProgress {
    RouteProgress {
        route: Arc::clone(route),
        current_state: state,
        distance_remaining: (route.distance / 2.0) as f32,
        duration_remaining: route.duration / 2.0,
        distance_traveled: (route.distance / 2.0) as f32,
        current_leg_progress: Some(LegProgress { leg_index: 0, step_index: 1 }),
    }
}

/// Reporter that keeps every event it receives.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<MetricEvent>>,
    disabled: AtomicBool,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(MetricEvent::metric_name).collect()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }
}

impl MetricsReporter for RecordingReporter {
    fn add_event(&self, event: MetricEvent) {
        self.events.lock().push(event);
    }

    fn disable(&self) {
        self.disabled.store(true, Ordering::Release);
    }
}

/// Poll `condition` until it holds, giving up after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .is_ok()
}

/// Host SDK double that records registered observers.
#[derive(Default)]
pub struct FakeNavigation {
    progress: Mutex<Vec<Arc<dyn RouteProgressObserver>>>,
    location: Mutex<Vec<Arc<dyn LocationObserver>>>,
    routes: Mutex<Vec<Arc<dyn RoutesObserver>>>,
    off_route: Mutex<Vec<Arc<dyn OffRouteObserver>>>,
    session_state: Mutex<Vec<Arc<dyn SessionStateObserver>>>,
}

impl FakeNavigation {
    /// Registered observers per kind: progress, location, routes, off-route, session state.
    pub fn counts(&self) -> [usize; 5] {
        [
            self.progress.lock().len(),
            self.location.lock().len(),
            self.routes.lock().len(),
            self.off_route.lock().len(),
            self.session_state.lock().len(),
        ]
    }

    pub fn raw_location(&self, location: &LocationSample) {
        self.location.lock().iter().for_each(|o| o.on_raw_location_changed(location));
    }

    pub fn progress(&self, progress: &RouteProgress) {
        self.progress.lock().iter().for_each(|o| o.on_route_progress_changed(progress));
    }

    pub fn routes(&self, routes: &[Arc<Route>]) {
        self.routes.lock().iter().for_each(|o| o.on_routes_changed(routes));
    }

    pub fn off_route(&self, off_route: bool) {
        self.off_route.lock().iter().for_each(|o| o.on_off_route_state_changed(off_route));
    }

    pub fn session_state(&self, state: crate::types::NavigationSessionState) {
        self.session_state.lock().iter().for_each(|o| o.on_session_state_changed(state));
    }
}

fn remove<T: ?Sized>(observers: &Mutex<Vec<Arc<T>>>, observer: &Arc<T>) {
    observers.lock().retain(|o| !Arc::ptr_eq(o, observer));
}

impl NavigationObservable for FakeNavigation {
    fn register_route_progress_observer(&self, observer: Arc<dyn RouteProgressObserver>) {
        self.progress.lock().push(observer);
    }

    fn unregister_route_progress_observer(&self, observer: &Arc<dyn RouteProgressObserver>) {
        remove(&self.progress, observer);
    }

    fn register_location_observer(&self, observer: Arc<dyn LocationObserver>) {
        self.location.lock().push(observer);
    }

    fn unregister_location_observer(&self, observer: &Arc<dyn LocationObserver>) {
        remove(&self.location, observer);
    }

    fn register_routes_observer(&self, observer: Arc<dyn RoutesObserver>) {
        self.routes.lock().push(observer);
    }

    fn unregister_routes_observer(&self, observer: &Arc<dyn RoutesObserver>) {
        remove(&self.routes, observer);
    }

    fn register_off_route_observer(&self, observer: Arc<dyn OffRouteObserver>) {
        self.off_route.lock().push(observer);
    }

    fn unregister_off_route_observer(&self, observer: &Arc<dyn OffRouteObserver>) {
        remove(&self.off_route, observer);
    }

    fn register_session_state_observer(&self, observer: Arc<dyn SessionStateObserver>) {
        self.session_state.lock().push(observer);
    }

    fn unregister_session_state_observer(&self, observer: &Arc<dyn SessionStateObserver>) {
        remove(&self.session_state, observer);
    }
}

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
