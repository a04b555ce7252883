//! Derived route metrics and timestamp formatting shared by all events

use chrono::{DateTime, Utc};

use crate::types::{LocationSample, Point};

/// Mean earth radius in metres.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance in whole metres between a location and a point.
pub fn absolute_distance(from: &LocationSample, to: Point) -> i32 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    (EARTH_RADIUS_M * c) as i32
}

/// Event timestamp in `yyyy-MM-ddTHH:mm:ss.SSS+zzzz` form.
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string()
}
