//! Route value objects
//!
//! Routes come from the route provider and are only ever read here.

use serde::{Deserialize, Serialize};

/// Geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A single maneuver step within a leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegStep {
    /// Location of the maneuver that starts this step
    pub maneuver_location: Point,

    /// Step distance in metres
    #[serde(default)]
    pub distance: f64,

    /// Step duration in seconds
    #[serde(default)]
    pub duration: f64,
}

/// One leg of a route, between two waypoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    #[serde(default)]
    pub steps: Vec<LegStep>,
}

/// Request parameters echoed back with a route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteOptions {
    /// Routing profile, e.g. `driving-traffic`
    pub profile: Option<String>,

    /// Identifier of the directions request that produced the route
    pub request_uuid: Option<String>,
}

/// A computed route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Encoded polyline geometry
    #[serde(default)]
    pub geometry: String,

    /// Total distance in metres
    pub distance: f64,

    /// Expected travel time in seconds
    pub duration: f64,

    #[serde(default)]
    pub legs: Vec<RouteLeg>,

    /// Index of this route among the alternatives of its response
    #[serde(default)]
    pub route_index: Option<u32>,

    #[serde(default)]
    pub options: Option<RouteOptions>,
}

impl Route {
    /// Total number of steps across all legs.
    pub fn step_count(&self) -> usize {
        self.legs.iter().map(|leg| leg.steps.len()).sum()
    }

    /// Maneuver location of the final step of the final leg.
    pub fn destination(&self) -> Option<Point> {
        self.legs.last().and_then(|leg| leg.steps.last()).map(|step| step.maneuver_location)
    }

    pub fn profile(&self) -> Option<&str> {
        self.options.as_ref().and_then(|o| o.profile.as_deref())
    }

    pub fn request_uuid(&self) -> Option<&str> {
        self.options.as_ref().and_then(|o| o.request_uuid.as_deref())
    }
}
