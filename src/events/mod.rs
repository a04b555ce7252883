//! Telemetry events handed to the metrics sink.
//!
//! Every event except the turnstile carries a [`NavigationEventData`] block describing
//! the session, the route being followed and the original route. Event-specific data
//! sits alongside it and is flattened when serialized, so a sink sees one flat object
//! per event tagged with its metric name in the `event` field.

mod metrics;

pub use metrics::{absolute_distance, format_timestamp};

use serde::{Deserialize, Serialize};

use crate::types::LocationSample;

/// Location as reported inside reroute and feedback events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f32,
    pub course: f32,
    pub altitude: f64,
    pub timestamp: String,
    pub horizontal_accuracy: f32,
    pub vertical_accuracy: f32,
}

impl From<&LocationSample> for TelemetryLocation {
    fn from(sample: &LocationSample) -> Self {
        Self {
            latitude: sample.latitude,
            longitude: sample.longitude,
            speed: sample.speed,
            course: sample.bearing,
            altitude: sample.altitude,
            timestamp: sample.timestamp_ms.to_string(),
            horizontal_accuracy: sample.horizontal_accuracy,
            vertical_accuracy: sample.vertical_accuracy,
        }
    }
}

pub(crate) fn to_telemetry_locations(samples: &[LocationSample]) -> Vec<TelemetryLocation> {
    samples.iter().map(TelemetryLocation::from).collect()
}

/// App-usage event sent once when telemetry starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUserTurnstile {
    pub sdk_identifier: String,
    pub sdk_version: String,
    pub sku_id: Option<String>,
    pub created: String,
}

/// Fields shared by every navigation event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEventData {
    pub sdk_identifier: String,
    pub event_version: u32,
    pub created: String,

    // session
    pub session_identifier: String,
    pub trip_identifier: String,
    pub start_timestamp: String,
    pub reroute_count: u32,
    pub location_engine: String,
    pub simulation: bool,
    pub percent_time_in_portrait: u32,
    pub percent_time_in_foreground: u32,
    pub lat: f64,
    pub lng: f64,

    // current progress
    pub step_index: u32,
    pub distance_remaining: i32,
    pub duration_remaining: i32,
    pub distance_completed: i32,
    pub geometry: Option<String>,
    pub profile: Option<String>,
    pub request_identifier: Option<String>,
    pub step_count: usize,
    pub leg_index: u32,
    pub leg_count: usize,

    // original route
    pub original_step_count: usize,
    pub original_estimated_distance: i32,
    pub original_estimated_duration: i32,
    pub original_request_identifier: Option<String>,
    pub original_geometry: Option<String>,

    // route being followed
    pub absolute_distance_to_destination: i32,
    pub estimated_distance: i32,
    pub estimated_duration: i32,
    pub total_step_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationCancelEvent {
    #[serde(flatten)]
    pub navigation: NavigationEventData,
    /// Set when the session arrived before it was cancelled
    pub arrival_timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationRerouteEvent {
    #[serde(flatten)]
    pub navigation: NavigationEventData,
    pub new_distance_remaining: i32,
    pub new_duration_remaining: i32,
    pub new_geometry: String,
    pub seconds_since_last_reroute: i64,
    pub locations_before: Vec<TelemetryLocation>,
    pub locations_after: Vec<TelemetryLocation>,
}

/// What the user is reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FeedbackType {
    General,
    IncorrectVisualGuidance,
    IncorrectAudioGuidance,
    RoutingError,
    NotAllowed,
    RoadClosed,
    PositioningIssue,
    Other(String),
}

impl FeedbackType {
    pub fn as_str(&self) -> &str {
        match self {
            FeedbackType::General => "general",
            FeedbackType::IncorrectVisualGuidance => "incorrect_visual_guidance",
            FeedbackType::IncorrectAudioGuidance => "incorrect_audio_guidance",
            FeedbackType::RoutingError => "routing_error",
            FeedbackType::NotAllowed => "not_allowed",
            FeedbackType::RoadClosed => "road_closed",
            FeedbackType::PositioningIssue => "positioning_issue",
            FeedbackType::Other(other) => other,
        }
    }
}

impl From<String> for FeedbackType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "general" => FeedbackType::General,
            "incorrect_visual_guidance" => FeedbackType::IncorrectVisualGuidance,
            "incorrect_audio_guidance" => FeedbackType::IncorrectAudioGuidance,
            "routing_error" => FeedbackType::RoutingError,
            "not_allowed" => FeedbackType::NotAllowed,
            "road_closed" => FeedbackType::RoadClosed,
            "positioning_issue" => FeedbackType::PositioningIssue,
            _ => FeedbackType::Other(value),
        }
    }
}

impl From<FeedbackType> for String {
    fn from(value: FeedbackType) -> Self {
        value.as_str().to_string()
    }
}

/// Where the feedback came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FeedbackSource {
    User,
    Reroute,
    Unknown,
    Other(String),
}

impl FeedbackSource {
    pub fn as_str(&self) -> &str {
        match self {
            FeedbackSource::User => "user",
            FeedbackSource::Reroute => "reroute",
            FeedbackSource::Unknown => "unknown",
            FeedbackSource::Other(other) => other,
        }
    }
}

impl From<String> for FeedbackSource {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => FeedbackSource::User,
            "reroute" => FeedbackSource::Reroute,
            "unknown" => FeedbackSource::Unknown,
            _ => FeedbackSource::Other(value),
        }
    }
}

impl From<FeedbackSource> for String {
    fn from(value: FeedbackSource) -> Self {
        value.as_str().to_string()
    }
}

/// Host application details attached to feedback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// User feedback as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFeedback {
    pub feedback_type: FeedbackType,
    pub description: String,
    pub source: FeedbackSource,
    #[serde(default)]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub sub_types: Vec<String>,
    #[serde(default)]
    pub app_metadata: Option<AppMetadata>,
}

impl UserFeedback {
    pub fn new(
        feedback_type: FeedbackType,
        description: impl Into<String>,
        source: FeedbackSource,
    ) -> Self {
        Self {
            feedback_type,
            description: description.into(),
            source,
            screenshot: None,
            sub_types: Vec::new(),
            app_metadata: None,
        }
    }

    /// Base64-encoded screenshot
    pub fn with_screenshot(mut self, screenshot: impl Into<String>) -> Self {
        self.screenshot = Some(screenshot.into());
        self
    }

    pub fn with_sub_types(mut self, sub_types: Vec<String>) -> Self {
        self.sub_types = sub_types;
        self
    }

    pub fn with_app_metadata(mut self, app_metadata: AppMetadata) -> Self {
        self.app_metadata = Some(app_metadata);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationFeedbackEvent {
    #[serde(flatten)]
    pub navigation: NavigationEventData,
    pub feedback_type: FeedbackType,
    pub source: FeedbackSource,
    pub description: String,
    pub screenshot: Option<String>,
    pub feedback_sub_type: Vec<String>,
    pub app_metadata: Option<AppMetadata>,
    pub locations_before: Vec<TelemetryLocation>,
    pub locations_after: Vec<TelemetryLocation>,
}

/// Event handed to a [`MetricsReporter`](crate::reporter::MetricsReporter).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum MetricEvent {
    #[serde(rename = "appUserTurnstile")]
    Turnstile(AppUserTurnstile),
    #[serde(rename = "navigation.depart")]
    Depart(NavigationEventData),
    #[serde(rename = "navigation.arrive")]
    Arrive(NavigationEventData),
    #[serde(rename = "navigation.cancel")]
    Cancel(NavigationCancelEvent),
    #[serde(rename = "navigation.reroute")]
    Reroute(NavigationRerouteEvent),
    #[serde(rename = "navigation.feedback")]
    Feedback(NavigationFeedbackEvent),
}

impl MetricEvent {
    /// Metric name as used on the wire.
    pub fn metric_name(&self) -> &'static str {
        match self {
            MetricEvent::Turnstile(_) => "appUserTurnstile",
            MetricEvent::Depart(_) => "navigation.depart",
            MetricEvent::Arrive(_) => "navigation.arrive",
            MetricEvent::Cancel(_) => "navigation.cancel",
            MetricEvent::Reroute(_) => "navigation.reroute",
            MetricEvent::Feedback(_) => "navigation.feedback",
        }
    }

    /// Navigation block, absent only for the turnstile.
    pub fn navigation(&self) -> Option<&NavigationEventData> {
        match self {
            MetricEvent::Turnstile(_) => None,
            MetricEvent::Depart(data) | MetricEvent::Arrive(data) => Some(data),
            MetricEvent::Cancel(event) => Some(&event.navigation),
            MetricEvent::Reroute(event) => Some(&event.navigation),
            MetricEvent::Feedback(event) => Some(&event.navigation),
        }
    }

    /// Whether this event needs an active session with an original route to be sent.
    pub fn requires_session(&self) -> bool {
        !matches!(self, MetricEvent::Turnstile(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_type_round_trips_known_and_custom() {
        assert_eq!(FeedbackType::from("road_closed".to_string()), FeedbackType::RoadClosed);
        let custom = FeedbackType::from("lane_guidance".to_string());
        assert_eq!(custom, FeedbackType::Other("lane_guidance".to_string()));
        assert_eq!(String::from(custom), "lane_guidance");
        assert_eq!(FeedbackSource::from("user".to_string()), FeedbackSource::User);
    }

    #[test]
    fn serialized_events_are_flat_and_tagged() {
        let event = MetricEvent::Cancel(NavigationCancelEvent {
            navigation: NavigationEventData {
                session_identifier: "session-1".to_string(),
                ..Default::default()
            },
            arrival_timestamp: None,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "navigation.cancel");
        assert_eq!(json["sessionIdentifier"], "session-1");
        assert!(json["arrivalTimestamp"].is_null());
        assert_eq!(event.metric_name(), "navigation.cancel");
    }

    #[test]
    fn feedback_serializes_enum_as_string() {
        let event = MetricEvent::Feedback(NavigationFeedbackEvent {
            navigation: NavigationEventData::default(),
            feedback_type: FeedbackType::RoutingError,
            source: FeedbackSource::User,
            description: "wrong turn".to_string(),
            screenshot: None,
            feedback_sub_type: vec!["turn_was_not_allowed".to_string()],
            app_metadata: None,
            locations_before: vec![],
            locations_after: vec![TelemetryLocation::from(&LocationSample::new(7, 1.0, 2.0))],
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["feedbackType"], "routing_error");
        assert_eq!(json["source"], "user");
        assert_eq!(json["locationsAfter"][0]["timestamp"], "7");
    }

    #[test]
    fn only_turnstile_bypasses_session_gate() {
        let turnstile = MetricEvent::Turnstile(AppUserTurnstile {
            sdk_identifier: "sdk".to_string(),
            sdk_version: "1".to_string(),
            sku_id: None,
            created: String::new(),
        });
        assert!(!turnstile.requires_session());
        assert!(turnstile.navigation().is_none());
        assert!(MetricEvent::Arrive(NavigationEventData::default()).requires_session());
    }
}
