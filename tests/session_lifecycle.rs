//! Session lifecycle through the public API, observed from a channel sink.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use navigation_telemetry::{
    ChannelReporter, LocationSample, MetricEvent, NavigationSessionState, NavigationTelemetry,
    Route, RouteProgress, RouteProgressState,
};

fn route() -> Arc<Route> {
    Arc::new(Route {
        geometry: "geometry".to_string(),
        distance: 1500.0,
        duration: 200.0,
        ..Default::default()
    })
}

fn complete(route: &Arc<Route>) -> RouteProgress {
    RouteProgress {
        route: Arc::clone(route),
        current_state: RouteProgressState::RouteComplete,
        distance_remaining: 0.0,
        duration_remaining: 0.0,
        distance_traveled: 1500.0,
        current_leg_progress: None,
    }
}

async fn next_name(events: &mut (impl Stream<Item = MetricEvent> + Unpin)) -> &'static str {
    tokio::time::timeout(Duration::from_secs(5), events.next())
        .await
        .expect("timed out waiting for an event")
        .expect("event stream ended")
        .metric_name()
}

#[tokio::test(start_paused = true)]
async fn guidance_then_free_drive() {
    let (reporter, mut events) = ChannelReporter::new();
    let telemetry = NavigationTelemetry::builder().reporter(Arc::new(reporter)).start().unwrap();

    telemetry.dispatcher().on_raw_location(LocationSample::new(0, 52.52, 13.40));
    telemetry.dispatcher().on_routes_changed(&[route()]);
    telemetry.on_session_state_changed(NavigationSessionState::ActiveGuidance).unwrap();
    assert_eq!(next_name(&mut events).await, "appUserTurnstile");
    assert_eq!(next_name(&mut events).await, "navigation.depart");

    telemetry.on_session_state_changed(NavigationSessionState::FreeDrive).unwrap();
    let Some(MetricEvent::Cancel(cancel)) = events.next().await else {
        panic!("expected cancel");
    };
    assert!(cancel.arrival_timestamp.is_none());

    telemetry.shutdown().await;
    assert!(events.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn route_complete_arrives_once_per_session() {
    let (reporter, mut events) = ChannelReporter::new();
    let telemetry = NavigationTelemetry::builder().reporter(Arc::new(reporter)).start().unwrap();
    let route = route();

    telemetry.dispatcher().on_routes_changed(&[Arc::clone(&route)]);
    telemetry.on_session_state_changed(NavigationSessionState::ActiveGuidance).unwrap();
    assert_eq!(next_name(&mut events).await, "appUserTurnstile");
    assert_eq!(next_name(&mut events).await, "navigation.depart");

    telemetry.dispatcher().on_progress(complete(&route));
    assert_eq!(next_name(&mut events).await, "navigation.arrive");

    for _ in 0..3 {
        telemetry.dispatcher().on_progress(complete(&route));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // the only remaining event is the cancel from shutting down the session
    telemetry.shutdown().await;
    let rest: Vec<_> = events.map(|e| e.metric_name()).collect().await;
    assert_eq!(rest, vec!["navigation.cancel"]);
}
