//! Event population and the session gate

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use super::delivery::{Delivery, DeliveryQueue};
use super::values::SessionValues;
use crate::config::TelemetryConfig;
use crate::dispatcher::TelemetryDispatcher;
use crate::events::{
    AppUserTurnstile, MetricEvent, NavigationCancelEvent, NavigationEventData,
    NavigationFeedbackEvent, NavigationRerouteEvent, UserFeedback, absolute_distance,
    format_timestamp, to_telemetry_locations,
};
use crate::types::{LocationSample, Route};

/// Everything an event needs to be populated and sent.
///
/// Shared by the coordinator and by window callbacks, which may complete on
/// whichever thread delivered the filling location. Sending only queues the event.
pub(crate) struct EventContext {
    pub(crate) config: TelemetryConfig,
    pub(crate) events: DeliveryQueue,
    pub(crate) dispatcher: Arc<TelemetryDispatcher>,
    pub(crate) values: Arc<SessionValues>,
}

impl EventContext {
    /// Queue an event for the reporter if the session allows it.
    pub(crate) fn send(&self, event: MetricEvent) {
        if event.requires_session() && !self.values.is_telemetry_available() {
            debug!(
                session_started = self.values.is_started(),
                original_route = self.values.original_route().is_some(),
                "{} not sent",
                event.metric_name()
            );
            return;
        }
        let name = event.metric_name();
        if self.events.send(Delivery::Event(event)).is_err() {
            debug!("{} discarded, reporter disabled", name);
            return;
        }
        debug!("{} sent", name);
    }

    /// Disable the reporter once every queued event has been delivered.
    pub(crate) fn disable_reporter(&self) {
        let _ = self.events.send(Delivery::Disable);
    }

    pub(crate) fn turnstile(&self) -> MetricEvent {
        MetricEvent::Turnstile(AppUserTurnstile {
            sdk_identifier: self.config.sdk_identifier().to_string(),
            sdk_version: self.config.sdk_version.clone(),
            sku_id: self.config.sku_id.clone(),
            created: format_timestamp(Utc::now()),
        })
    }

    /// Depart event describing `route` from where the trip began.
    pub(crate) fn depart(&self, route: &Route) -> MetricEvent {
        let first_location = self.dispatcher.first_location().cloned();
        MetricEvent::Depart(self.populate(Some(route), first_location.as_ref()))
    }

    pub(crate) fn arrive(&self) -> MetricEvent {
        MetricEvent::Arrive(self.populate(None, None))
    }

    pub(crate) fn cancel(&self) -> MetricEvent {
        MetricEvent::Cancel(NavigationCancelEvent {
            navigation: self.populate(None, None),
            arrival_timestamp: self.values.arrived_at().map(format_timestamp),
        })
    }

    pub(crate) fn reroute(
        &self,
        new_route: &Route,
        since_last_reroute: Duration,
        before: &[LocationSample],
        after: &[LocationSample],
    ) -> MetricEvent {
        let navigation = self.populate(None, None);
        MetricEvent::Reroute(NavigationRerouteEvent {
            new_distance_remaining: new_route.distance as i32,
            new_duration_remaining: new_route.duration as i32,
            new_geometry: new_route.geometry.clone(),
            seconds_since_last_reroute: since_last_reroute.as_secs() as i64,
            locations_before: to_telemetry_locations(before),
            locations_after: to_telemetry_locations(after),
            navigation,
        })
    }

    pub(crate) fn feedback(
        &self,
        feedback: UserFeedback,
        before: &[LocationSample],
        after: &[LocationSample],
    ) -> MetricEvent {
        MetricEvent::Feedback(NavigationFeedbackEvent {
            navigation: self.populate(None, None),
            feedback_type: feedback.feedback_type,
            source: feedback.source,
            description: feedback.description,
            screenshot: feedback.screenshot,
            feedback_sub_type: feedback.sub_types,
            app_metadata: feedback.app_metadata,
            locations_before: to_telemetry_locations(before),
            locations_after: to_telemetry_locations(after),
        })
    }

    /// Fill the shared navigation block.
    ///
    /// `route` defaults to the route of the latest progress and `location` to the
    /// latest raw location.
    pub(crate) fn populate(
        &self,
        route: Option<&Route>,
        location: Option<&LocationSample>,
    ) -> NavigationEventData {
        let progress = self.dispatcher.route_progress();
        let last_location = self.dispatcher.last_location();
        let location = location.or(last_location.as_ref());
        let followed = route.or(progress.as_deref().map(|p| p.route.as_ref()));
        let original = self.values.original_route();

        let mut data = NavigationEventData {
            sdk_identifier: self.config.sdk_identifier().to_string(),
            event_version: self.config.event_version,
            created: format_timestamp(Utc::now()),
            session_identifier: self.values.session_id(),
            trip_identifier: self.values.trip_id(),
            start_timestamp: format_timestamp(self.values.started_at()),
            reroute_count: self.values.reroute_count(),
            location_engine: self.config.location_engine.clone(),
            simulation: self.config.is_simulation(),
            percent_time_in_portrait: 100,
            percent_time_in_foreground: 100,
            ..Default::default()
        };

        if let Some(location) = location {
            data.lat = location.latitude;
            data.lng = location.longitude;
        }

        if let Some(progress) = progress.as_deref() {
            data.distance_remaining = progress.distance_remaining as i32;
            data.duration_remaining = progress.duration_remaining as i32;
            data.distance_completed = progress.distance_traveled as i32;
            if let Some(leg) = &progress.current_leg_progress {
                data.step_index = leg.step_index;
                data.leg_index = leg.leg_index;
            }
            data.geometry = Some(progress.route.geometry.clone());
            data.profile = progress.route.profile().map(str::to_string);
            data.request_identifier = progress.route.request_uuid().map(str::to_string);
            data.step_count = progress.route.step_count();
            data.leg_count = progress.route.legs.len();
        }

        if let Some(original) = original.as_deref() {
            data.original_step_count = original.step_count();
            data.original_estimated_distance = original.distance as i32;
            data.original_estimated_duration = original.duration as i32;
            data.original_request_identifier = original.request_uuid().map(str::to_string);
            data.original_geometry = Some(original.geometry.clone());
        }

        if let Some(route) = followed {
            data.estimated_distance = route.distance as i32;
            data.estimated_duration = route.duration as i32;
            data.total_step_count = route.step_count();
            let destination = route.destination();
            if let (Some(location), Some(destination)) = (last_location.as_ref(), destination) {
                data.absolute_distance_to_destination = absolute_distance(location, destination);
            }
        }

        data
    }
}
