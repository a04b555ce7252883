//! Aggregation point for location, progress, route and off-route signals
//!
//! The dispatcher keeps the latest progress and the recent locations, and publishes
//! two kinds of notification on conflating [`watch`] channels: route progress and
//! new routes. A conflating channel keeps only the newest unread value, which is all
//! the session coordinator needs.
//!
//! The first route seen after a reset becomes the session's original route and is
//! not published. Every later route is published as [`NewRoute::Reroute`] when an
//! off-route signal was latched since the previous route, else [`NewRoute::External`].

use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{Stream, StreamExt};
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, trace, warn};

use crate::buffer::{LocationBuffers, WindowCallback};
use crate::observer::{LocationObserver, OffRouteObserver, RouteProgressObserver, RoutesObserver};
use crate::types::{LocationSample, Route, RouteProgress};

/// Why the active route changed.
#[derive(Debug, Clone, PartialEq)]
pub enum NewRoute {
    /// Route set directly by the application
    External(Arc<Route>),
    /// Route produced after off-route detection
    Reroute(Arc<Route>),
}

impl NewRoute {
    pub fn route(&self) -> &Arc<Route> {
        match self {
            NewRoute::External(route) | NewRoute::Reroute(route) => route,
        }
    }

    pub fn is_reroute(&self) -> bool {
        matches!(self, NewRoute::Reroute(_))
    }
}

/// Single-resolution cell holding a session's original route.
///
/// Resolves at most once. Resetting the dispatcher replaces the whole cell, which
/// closes the channel for anyone still waiting on the old one.
#[derive(Debug)]
pub struct OriginalRoute {
    tx: watch::Sender<Option<Arc<Route>>>,
}

impl OriginalRoute {
    pub fn pending() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn resolved(route: Arc<Route>) -> Self {
        let (tx, _) = watch::channel(Some(route));
        Self { tx }
    }

    pub fn is_resolved(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn get(&self) -> Option<Arc<Route>> {
        self.tx.borrow().clone()
    }

    /// Resolve the cell. Returns `false` if it was already resolved.
    pub fn resolve(&self, route: Arc<Route>) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(route);
            true
        })
    }

    /// Handle that can await resolution independently of the cell's lifetime.
    pub fn wait(&self) -> PendingOriginalRoute {
        PendingOriginalRoute { rx: self.tx.subscribe() }
    }
}

/// Awaitable view of an [`OriginalRoute`].
#[derive(Debug)]
pub struct PendingOriginalRoute {
    rx: watch::Receiver<Option<Arc<Route>>>,
}

impl PendingOriginalRoute {
    /// Wait for the route. Returns `None` if the cell was discarded unresolved.
    pub async fn resolved(mut self) -> Option<Arc<Route>> {
        let route = match self.rx.wait_for(Option::is_some).await {
            Ok(route) => route.clone(),
            Err(_) => None,
        };
        route
    }
}

/// Latest-value cache and conflating publisher for navigation signals.
#[derive(Debug)]
pub struct TelemetryDispatcher {
    buffers: LocationBuffers,
    first_location: OnceLock<LocationSample>,
    route_progress: RwLock<Option<Arc<RouteProgress>>>,
    progress_tx: watch::Sender<Option<Arc<RouteProgress>>>,
    new_route_tx: watch::Sender<Option<NewRoute>>,
    original_route: RwLock<Arc<OriginalRoute>>,
    needs_reroute: AtomicBool,
}

impl Default for TelemetryDispatcher {
    fn default() -> Self {
        Self::new(crate::buffer::LOCATION_BUFFER_MAX_SIZE)
    }
}

impl TelemetryDispatcher {
    /// Create a dispatcher keeping `buffer_size` locations before and after events.
    pub fn new(buffer_size: usize) -> Self {
        let (progress_tx, _) = watch::channel(None);
        let (new_route_tx, _) = watch::channel(None);
        Self {
            buffers: LocationBuffers::new(buffer_size),
            first_location: OnceLock::new(),
            route_progress: RwLock::new(None),
            progress_tx,
            new_route_tx,
            original_route: RwLock::new(Arc::new(OriginalRoute::pending())),
            needs_reroute: AtomicBool::new(false),
        }
    }

    /// Record a raw location, feeding every pending event window.
    pub fn on_raw_location(&self, location: LocationSample) {
        self.buffers.record(location.clone());
        if self.first_location.set(location).is_ok() {
            debug!("first location recorded");
        }
    }

    pub fn on_progress(&self, progress: RouteProgress) {
        trace!(state = ?progress.current_state, "route progress");
        let progress = Arc::new(progress);
        *self.route_progress.write() = Some(Arc::clone(&progress));
        self.progress_tx.send_replace(Some(progress));
    }

    pub fn on_routes_changed(&self, routes: &[Arc<Route>]) {
        debug!(count = routes.len(), "routes changed");
        let Some(route) = routes.first() else {
            return;
        };

        // a caller that loses the race to resolve publishes its route instead
        if self.original_route().resolve(Arc::clone(route)) {
            debug!("original route set");
            return;
        }

        let new_route = if self.needs_reroute.swap(false, Ordering::AcqRel) {
            NewRoute::Reroute(Arc::clone(route))
        } else {
            NewRoute::External(Arc::clone(route))
        };
        self.new_route_tx.send_replace(Some(new_route));
    }

    /// Latch a pending reroute. Only `true` has an effect; the latch is cleared by
    /// the next routes-changed signal.
    pub fn on_off_route(&self, off_route: bool) {
        debug!(off_route, "off-route state changed");
        if off_route {
            self.needs_reroute.store(true, Ordering::Release);
        }
    }

    /// Route requests are retried, if at all, by the caller.
    pub fn on_route_request_failed(&self, reason: &str) {
        warn!(reason, "route request failed; no telemetry change");
    }

    /// Replace the original-route cell, optionally pre-resolved.
    pub fn reset_original_route(&self, route: Option<Arc<Route>>) {
        let cell = match route {
            Some(route) => OriginalRoute::resolved(route),
            None => OriginalRoute::pending(),
        };
        *self.original_route.write() = Arc::new(cell);
    }

    /// Forget cached progress and drop any unread progress notification.
    pub fn reset_route_progress(&self) {
        *self.route_progress.write() = None;
        self.progress_tx.send_if_modified(|slot| {
            *slot = None;
            false
        });
    }

    pub fn original_route(&self) -> Arc<OriginalRoute> {
        Arc::clone(&self.original_route.read())
    }

    pub fn route_progress(&self) -> Option<Arc<RouteProgress>> {
        self.route_progress.read().clone()
    }

    pub fn first_location(&self) -> Option<&LocationSample> {
        self.first_location.get()
    }

    pub fn last_location(&self) -> Option<LocationSample> {
        self.buffers.last_location()
    }

    /// Receiver for route notifications published after this call.
    pub fn subscribe_new_routes(&self) -> watch::Receiver<Option<NewRoute>> {
        self.new_route_tx.subscribe()
    }

    /// Receiver for progress notifications published after this call.
    pub fn subscribe_progress(&self) -> watch::Receiver<Option<Arc<RouteProgress>>> {
        self.progress_tx.subscribe()
    }

    /// Progress notifications as a stream, latest-wins.
    pub fn progress_updates(&self) -> impl Stream<Item = Arc<RouteProgress>> + 'static {
        WatchStream::from_changes(self.progress_tx.subscribe()).filter_map(|opt| async move { opt })
    }

    /// Open a before/after location window around an event happening now.
    pub fn open_event_window(&self, on_complete: WindowCallback) {
        self.buffers.open_window(on_complete);
    }

    /// Complete every pending window with what it has collected so far.
    pub fn flush_event_windows(&self) {
        self.buffers.flush();
    }

    pub fn pending_event_windows(&self) -> usize {
        self.buffers.pending_windows()
    }
}

impl LocationObserver for TelemetryDispatcher {
    fn on_raw_location_changed(&self, location: &LocationSample) {
        self.on_raw_location(location.clone());
    }
}

impl RouteProgressObserver for TelemetryDispatcher {
    fn on_route_progress_changed(&self, progress: &RouteProgress) {
        self.on_progress(progress.clone());
    }
}

impl RoutesObserver for TelemetryDispatcher {
    fn on_routes_changed(&self, routes: &[Arc<Route>]) {
        TelemetryDispatcher::on_routes_changed(self, routes);
    }
}

impl OffRouteObserver for TelemetryDispatcher {
    fn on_off_route_state_changed(&self, off_route: bool) {
        self.on_off_route(off_route);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{location, progress, route};
    use crate::types::RouteProgressState;
    use parking_lot::Mutex;

    /// Dispatcher whose original route is already set, like a running session.
    fn dispatcher_with_original(original: &Arc<Route>) -> TelemetryDispatcher {
        let dispatcher = TelemetryDispatcher::default();
        dispatcher.on_routes_changed(&[Arc::clone(original)]);
        dispatcher
    }

    fn take(rx: &mut watch::Receiver<Option<NewRoute>>) -> NewRoute {
        assert!(rx.has_changed().unwrap(), "expected a route notification");
        rx.borrow_and_update().clone().expect("notification carries a route")
    }

    #[test]
    fn first_route_resolves_original_without_publishing() {
        let dispatcher = TelemetryDispatcher::default();
        let mut rx = dispatcher.subscribe_new_routes();
        let first = route(1000.0);

        dispatcher.on_routes_changed(&[Arc::clone(&first)]);

        assert!(!rx.has_changed().unwrap());
        assert_eq!(dispatcher.original_route().get(), Some(first));
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn original_route_set_only_once() {
        let first = route(1000.0);
        let dispatcher = dispatcher_with_original(&first);

        dispatcher.on_routes_changed(&[route(2000.0)]);
        dispatcher.on_routes_changed(&[route(3000.0)]);

        assert_eq!(dispatcher.original_route().get(), Some(first));
    }

    #[test]
    fn concurrent_first_routes_resolve_once_and_publish_the_rest() {
        let dispatcher = Arc::new(TelemetryDispatcher::default());
        let mut rx = dispatcher.subscribe_new_routes();
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let dispatcher = Arc::clone(&dispatcher);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let candidate = route(1000.0 + f64::from(i));
                    barrier.wait();
                    dispatcher.on_routes_changed(&[candidate]);
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let original = dispatcher.original_route().get().expect("one route resolved the cell");
        let NewRoute::External(published) = take(&mut rx) else {
            panic!("expected an external route");
        };
        assert_ne!(published.distance, original.distance);
    }

    #[test]
    fn empty_route_list_is_ignored() {
        let dispatcher = TelemetryDispatcher::default();
        let rx = dispatcher.subscribe_new_routes();

        dispatcher.on_routes_changed(&[]);

        assert!(!dispatcher.original_route().is_resolved());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn every_later_route_publishes_once() {
        let dispatcher = dispatcher_with_original(&route(1.0));
        let mut rx = dispatcher.subscribe_new_routes();

        for distance in [2.0, 3.0, 4.0] {
            let next = route(distance);
            dispatcher.on_routes_changed(&[Arc::clone(&next)]);
            assert_eq!(take(&mut rx), NewRoute::External(next));
            assert!(!rx.has_changed().unwrap());
        }
    }

    #[test]
    fn off_route_marks_next_route_as_reroute() {
        let dispatcher = dispatcher_with_original(&route(1.0));
        let mut rx = dispatcher.subscribe_new_routes();
        let rerouted = route(2.0);

        dispatcher.on_off_route(true);
        dispatcher.on_routes_changed(&[Arc::clone(&rerouted)]);

        assert_eq!(take(&mut rx), NewRoute::Reroute(rerouted));
    }

    #[test]
    fn off_route_latch_survives_intermediate_false() {
        let dispatcher = dispatcher_with_original(&route(1.0));
        let mut rx = dispatcher.subscribe_new_routes();

        dispatcher.on_off_route(true);
        dispatcher.on_off_route(false);
        dispatcher.on_routes_changed(&[route(2.0)]);

        assert!(take(&mut rx).is_reroute());
    }

    #[test]
    fn route_classification_sequence() {
        let dispatcher = dispatcher_with_original(&route(1.0));
        let mut rx = dispatcher.subscribe_new_routes();
        let next = route(2.0);
        let mut publish = |off_route: Option<bool>| {
            if let Some(flag) = off_route {
                dispatcher.on_off_route(flag);
            }
            dispatcher.on_routes_changed(&[Arc::clone(&next)]);
            take(&mut rx).is_reroute()
        };

        assert!(!publish(None));
        assert!(!publish(None));
        assert!(publish(Some(true)));
        assert!(!publish(None));
        assert!(!publish(Some(false)));
        assert!(publish(Some(true)));
    }

    #[test]
    fn route_notifications_conflate() {
        let dispatcher = dispatcher_with_original(&route(1.0));
        let mut rx = dispatcher.subscribe_new_routes();
        let last = route(3.0);

        dispatcher.on_routes_changed(&[route(2.0)]);
        dispatcher.on_routes_changed(&[Arc::clone(&last)]);

        assert_eq!(take(&mut rx), NewRoute::External(last));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn raw_locations_update_last_and_first() {
        let dispatcher = TelemetryDispatcher::default();
        assert!(dispatcher.last_location().is_none());

        dispatcher.on_raw_location(location(1));
        assert_eq!(dispatcher.last_location(), Some(location(1)));

        dispatcher.on_raw_location(location(2));
        assert_eq!(dispatcher.last_location(), Some(location(2)));
        assert_eq!(dispatcher.first_location(), Some(&location(1)));
    }

    #[test]
    fn enhanced_locations_are_ignored() {
        let dispatcher = TelemetryDispatcher::default();
        LocationObserver::on_enhanced_location_changed(&dispatcher, &location(1), &[]);
        assert!(dispatcher.last_location().is_none());
        assert!(dispatcher.first_location().is_none());
    }

    #[test]
    fn progress_is_cached_and_published() {
        let dispatcher = TelemetryDispatcher::default();
        let mut rx = dispatcher.subscribe_progress();
        let update = progress(&route(1.0), RouteProgressState::LocationTracking);

        dispatcher.on_progress(update.clone());

        assert_eq!(dispatcher.route_progress().as_deref(), Some(&update));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_deref(), Some(&update));
    }

    #[test]
    fn reset_route_progress_clears_cache_and_slot() {
        let dispatcher = TelemetryDispatcher::default();
        let mut rx = dispatcher.subscribe_progress();
        dispatcher.on_progress(progress(&route(1.0), RouteProgressState::LocationTracking));

        dispatcher.reset_route_progress();

        assert!(dispatcher.route_progress().is_none());
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn reset_original_route() {
        let dispatcher = dispatcher_with_original(&route(1.0));

        dispatcher.reset_original_route(None);
        assert!(!dispatcher.original_route().is_resolved());

        let replacement = route(5.0);
        dispatcher.reset_original_route(Some(Arc::clone(&replacement)));
        assert!(dispatcher.original_route().is_resolved());
        assert_eq!(dispatcher.original_route().get(), Some(replacement));
    }

    #[tokio::test]
    async fn waiting_for_original_route() {
        let dispatcher = TelemetryDispatcher::default();
        let pending = dispatcher.original_route().wait();
        let first = route(1.0);

        dispatcher.on_routes_changed(&[Arc::clone(&first)]);

        assert_eq!(pending.resolved().await, Some(first));
    }

    #[tokio::test]
    async fn reset_releases_waiters_on_old_cell() {
        let dispatcher = TelemetryDispatcher::default();
        let pending = dispatcher.original_route().wait();

        dispatcher.reset_original_route(None);

        assert_eq!(pending.resolved().await, None);
    }

    #[tokio::test]
    async fn progress_stream_yields_latest() {
        let dispatcher = TelemetryDispatcher::default();
        let mut updates = Box::pin(dispatcher.progress_updates());
        let base = route(1.0);

        dispatcher.on_progress(progress(&base, RouteProgressState::LocationTracking));
        dispatcher.on_progress(progress(&base, RouteProgressState::RouteComplete));

        let latest = updates.next().await.unwrap();
        assert!(latest.is_complete());
    }

    #[test]
    fn event_windows_see_dispatched_locations() {
        let dispatcher = TelemetryDispatcher::new(3);
        let seen = Arc::new(Mutex::new(None));

        dispatcher.on_raw_location(location(1));
        let slot = Arc::clone(&seen);
        dispatcher.open_event_window(Box::new(move |pre, post| {
            *slot.lock() = Some((pre.len(), post.len()));
        }));
        dispatcher.on_raw_location(location(2));
        assert_eq!(dispatcher.pending_event_windows(), 1);

        dispatcher.flush_event_windows();
        assert_eq!(*seen.lock(), Some((1, 1)));
        assert_eq!(dispatcher.pending_event_windows(), 0);
    }
}
