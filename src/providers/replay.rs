//! Replay provider for recorded trips
//!
//! A trip recording is a YAML document listing signals with their offset from the
//! start of the trip:
//!
//! ```yaml
//! name: short trip
//! signals:
//!   - at_ms: 0
//!     signal: { kind: session_state, data: active_guidance }
//!   - at_ms: 1000
//!     signal:
//!       kind: raw_location
//!       data: { timestamp_ms: 1000, latitude: 52.52, longitude: 13.40 }
//! ```

use std::collections::VecDeque;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant, sleep_until};
use tracing::{debug, info, trace};

use crate::provider::{NavigationSignal, SignalProvider};
use crate::{Result, TelemetryError};

/// Recorded signal with its offset from the start of the trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedSignal {
    pub at_ms: u64,
    pub signal: NavigationSignal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripRecording {
    #[serde(default)]
    pub name: Option<String>,
    pub signals: Vec<TimedSignal>,
}

impl TripRecording {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let recording: Self = serde_yaml_ng::from_str(yaml)?;
        recording.validate()?;
        Ok(recording)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Offsets must never go backwards.
    pub fn validate(&self) -> Result<()> {
        let out_of_order = self.signals.windows(2).position(|pair| pair[1].at_ms < pair[0].at_ms);
        match out_of_order {
            Some(index) => Err(TelemetryError::parse_error(
                "trip recording",
                format!("signal {} is recorded before signal {}", index + 1, index),
            )),
            None => Ok(()),
        }
    }

    /// Offset of the last signal.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.signals.last().map_or(0, |s| s.at_ms))
    }
}

/// Replay provider that plays back a [`TripRecording`]
pub struct ReplayProvider {
    signals: VecDeque<TimedSignal>,

    /// Playback speed multiplier (1.0 = recorded pace, 2.0 = double speed)
    speed: f64,

    /// Set when the first signal is read
    started: Option<Instant>,

    total: usize,
}

impl ReplayProvider {
    pub fn new(recording: TripRecording) -> Self {
        info!(
            "Replaying trip {}: {} signals over {:?}",
            recording.name.as_deref().unwrap_or("<unnamed>"),
            recording.signals.len(),
            recording.duration()
        );
        let total = recording.signals.len();
        Self { signals: recording.signals.into(), speed: 1.0, started: None, total }
    }

    /// Load a recording from a YAML file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(TripRecording::load(path)?))
    }

    /// Set playback speed
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(0.1, 10.0);
        debug!("Playback speed set to {}x", self.speed);
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.set_speed(speed);
        self
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn remaining(&self) -> usize {
        self.signals.len()
    }

    fn due_at(&self, start: Instant, at_ms: u64) -> Instant {
        start + Duration::from_secs_f64(at_ms as f64 / 1000.0 / self.speed)
    }
}

#[async_trait::async_trait]
impl SignalProvider for ReplayProvider {
    async fn next_signal(&mut self) -> Result<Option<NavigationSignal>> {
        let Some(next) = self.signals.pop_front() else {
            debug!("Reached end of replay");
            return Ok(None);
        };

        let start = *self.started.get_or_insert_with(Instant::now);
        sleep_until(self.due_at(start, next.at_ms)).await;

        trace!(
            "Signal {}/{} at {}ms: {}",
            self.total - self.signals.len(),
            self.total,
            next.at_ms,
            next.signal.kind()
        );
        Ok(Some(next.signal))
    }
}
