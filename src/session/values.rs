//! Per-session values shared between the coordinator and event callbacks

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use crate::types::Route;

pub(crate) fn new_identifier() -> String {
    Uuid::new_v4().to_string()
}

/// Mutable state of the current telemetry session.
///
/// Only the coordinator writes; window callbacks and the service handle read from
/// other tasks, hence atomics and locks throughout.
#[derive(Debug)]
pub(crate) struct SessionValues {
    session_id: RwLock<String>,
    trip_id: RwLock<String>,
    started_at: RwLock<DateTime<Utc>>,
    started_instant: Mutex<Instant>,
    arrived_at: RwLock<Option<DateTime<Utc>>>,
    reroute_count: AtomicU32,
    last_reroute: Mutex<Option<Instant>>,
    session_started: AtomicBool,
    original_route: RwLock<Option<Arc<Route>>>,
}

impl SessionValues {
    pub(crate) fn new() -> Self {
        Self {
            session_id: RwLock::new(new_identifier()),
            trip_id: RwLock::new(new_identifier()),
            started_at: RwLock::new(Utc::now()),
            started_instant: Mutex::new(Instant::now()),
            arrived_at: RwLock::new(None),
            reroute_count: AtomicU32::new(0),
            last_reroute: Mutex::new(None),
            session_started: AtomicBool::new(false),
            original_route: RwLock::new(None),
        }
    }

    /// Begin a session following `route`.
    pub(crate) fn start(&self, route: Arc<Route>) {
        *self.original_route.write() = Some(route);
        *self.session_id.write() = new_identifier();
        *self.started_at.write() = Utc::now();
        *self.started_instant.lock() = Instant::now();
        self.session_started.store(true, Ordering::Release);
    }

    /// Return every value to a fresh, not-started state.
    pub(crate) fn reset(&self) {
        self.reroute_count.store(0, Ordering::Release);
        *self.last_reroute.lock() = None;
        *self.session_id.write() = new_identifier();
        *self.trip_id.write() = new_identifier();
        *self.arrived_at.write() = None;
        *self.original_route.write() = None;
        self.session_started.store(false, Ordering::Release);
    }

    /// Count a reroute and return the time since the previous one, or since the
    /// session started for the first reroute.
    pub(crate) fn record_reroute(&self) -> Duration {
        let now = Instant::now();
        let previous = self.last_reroute.lock().replace(now);
        let since = previous.unwrap_or_else(|| *self.started_instant.lock());
        self.reroute_count.fetch_add(1, Ordering::AcqRel);
        now.saturating_duration_since(since)
    }

    /// Mark arrival: the next leg of travel gets a fresh trip id.
    pub(crate) fn record_arrival(&self) {
        *self.trip_id.write() = new_identifier();
        *self.arrived_at.write() = Some(Utc::now());
    }

    pub(crate) fn is_started(&self) -> bool {
        self.session_started.load(Ordering::Acquire)
    }

    pub(crate) fn original_route(&self) -> Option<Arc<Route>> {
        self.original_route.read().clone()
    }

    /// Events needing route context are only sent with a started session and a route.
    pub(crate) fn is_telemetry_available(&self) -> bool {
        self.original_route.read().is_some() && self.is_started()
    }

    pub(crate) fn session_id(&self) -> String {
        self.session_id.read().clone()
    }

    pub(crate) fn trip_id(&self) -> String {
        self.trip_id.read().clone()
    }

    pub(crate) fn started_at(&self) -> DateTime<Utc> {
        *self.started_at.read()
    }

    pub(crate) fn arrived_at(&self) -> Option<DateTime<Utc>> {
        *self.arrived_at.read()
    }

    pub(crate) fn reroute_count(&self) -> u32 {
        self.reroute_count.load(Ordering::Acquire)
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id(),
            trip_id: self.trip_id(),
            started: self.is_started(),
            started_at: self.started_at(),
            arrived_at: self.arrived_at(),
            reroute_count: self.reroute_count(),
            original_route: self.original_route(),
        }
    }
}

/// Point-in-time copy of the session values.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub trip_id: String,
    pub started: bool,
    pub started_at: DateTime<Utc>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub reroute_count: u32,
    pub original_route: Option<Arc<Route>>,
}
