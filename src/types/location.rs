//! Raw location samples

use serde::{Deserialize, Serialize};

/// A raw location fix as delivered by the location provider.
///
/// Samples are immutable once recorded; the buffers hand out clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Fix time in milliseconds since the Unix epoch
    pub timestamp_ms: i64,

    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Ground speed in metres per second
    #[serde(default)]
    pub speed: f32,

    /// Bearing in degrees
    #[serde(default)]
    pub bearing: f32,

    /// Altitude in metres
    #[serde(default)]
    pub altitude: f64,

    /// Horizontal accuracy in metres
    #[serde(default)]
    pub horizontal_accuracy: f32,

    /// Vertical accuracy in metres (0 when the provider does not report it)
    #[serde(default)]
    pub vertical_accuracy: f32,
}

impl LocationSample {
    /// Create a sample with only a position and timestamp.
    pub fn new(timestamp_ms: i64, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp_ms,
            latitude,
            longitude,
            speed: 0.0,
            bearing: 0.0,
            altitude: 0.0,
            horizontal_accuracy: 0.0,
            vertical_accuracy: 0.0,
        }
    }

    /// Set speed and bearing.
    pub fn with_motion(mut self, speed: f32, bearing: f32) -> Self {
        self.speed = speed;
        self.bearing = bearing;
        self
    }

    /// Set altitude and accuracies.
    pub fn with_accuracy(mut self, altitude: f64, horizontal: f32, vertical: f32) -> Self {
        self.altitude = altitude;
        self.horizontal_accuracy = horizontal;
        self.vertical_accuracy = vertical;
        self
    }
}
