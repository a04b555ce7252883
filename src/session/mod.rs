//! Telemetry service: the session lifecycle coordinator and its handles
//!
//! [`NavigationTelemetry`] is an explicitly owned service. Building it sends the
//! app-usage turnstile and spawns the coordinator and event delivery tasks; dropping
//! it (or cancelling the owner's token) runs the same stop sequence as leaving active
//! guidance, then disables the reporter.
//!
//! Reporter calls never run on the caller's thread or on the coordinator: events are
//! queued and delivered by their own task, in the order they were produced.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use navigation_telemetry::{ChannelReporter, NavigationSessionState, NavigationTelemetry};
//!
//! # async fn run() -> navigation_telemetry::Result<()> {
//! let (reporter, _events) = ChannelReporter::new();
//! let telemetry = NavigationTelemetry::builder().reporter(Arc::new(reporter)).start()?;
//!
//! telemetry.on_session_state_changed(NavigationSessionState::ActiveGuidance)?;
//! telemetry.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod context;
mod coordinator;
mod delivery;
mod values;

pub use values::SessionSnapshot;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::dispatcher::TelemetryDispatcher;
use crate::events::UserFeedback;
use crate::observer::{
    LocationObserver, NavigationObservable, OffRouteObserver, RouteProgressObserver,
    RoutesObserver, SessionStateObserver,
};
use crate::provider::NavigationSignal;
use crate::reporter::MetricsReporter;
use crate::types::NavigationSessionState;
use crate::{Result, TelemetryError};
use context::EventContext;
use coordinator::{Command, Coordinator};
use delivery::deliver_events;
use values::SessionValues;

/// Builder for [`NavigationTelemetry`].
#[derive(Default)]
pub struct TelemetryBuilder {
    config: TelemetryConfig,
    reporter: Option<Arc<dyn MetricsReporter>>,
    dispatcher: Option<Arc<TelemetryDispatcher>>,
    cancel: Option<CancellationToken>,
}

impl TelemetryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: TelemetryConfig) -> Self {
        self.config = config;
        self
    }

    /// Sink for every emitted event. Required.
    pub fn reporter(mut self, reporter: Arc<dyn MetricsReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Use an existing dispatcher instead of creating one from the configuration.
    pub fn dispatcher(mut self, dispatcher: Arc<TelemetryDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Tie the service to an owner's lifecycle. Cancelling `token` stops the session.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Send the turnstile and spawn the service tasks on the current Tokio runtime.
    pub fn start(self) -> Result<NavigationTelemetry> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| TelemetryError::not_running("start telemetry outside a Tokio runtime"))?;
        let reporter =
            self.reporter.ok_or(TelemetryError::MissingComponent { component: "metrics reporter" })?;
        self.config.validate()?;

        let dispatcher = self
            .dispatcher
            .unwrap_or_else(|| Arc::new(TelemetryDispatcher::new(self.config.location_buffer_size)));
        let values = Arc::new(SessionValues::new());
        let (events, queue) = mpsc::unbounded_channel();
        let delivery = runtime.spawn(deliver_events(reporter, queue));
        let ctx = Arc::new(EventContext {
            config: self.config,
            events,
            dispatcher: Arc::clone(&dispatcher),
            values: Arc::clone(&values),
        });

        ctx.send(ctx.turnstile());

        let cancel = match self.cancel {
            Some(owner) => owner.child_token(),
            None => CancellationToken::new(),
        };
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let coordinator = Coordinator::new(ctx, commands_rx, cancel.clone());
        let task = runtime.spawn(coordinator.run());

        let handle = TelemetryHandle { dispatcher, commands: commands_tx };
        let observers = Observers::new(&handle);
        info!("Navigation telemetry started");

        Ok(NavigationTelemetry {
            handle,
            values,
            observers,
            cancel,
            task: Some(task),
            delivery: Some(delivery),
        })
    }
}

/// Cloneable, cheap handle for feeding the running service.
#[derive(Clone)]
pub struct TelemetryHandle {
    dispatcher: Arc<TelemetryDispatcher>,
    commands: mpsc::UnboundedSender<Command>,
}

impl TelemetryHandle {
    pub fn dispatcher(&self) -> &Arc<TelemetryDispatcher> {
        &self.dispatcher
    }

    pub fn on_session_state_changed(&self, state: NavigationSessionState) -> Result<()> {
        self.command(Command::SessionState(state), "session state change")
    }

    /// Submit user feedback. Only sent if a session is active.
    pub fn post_user_feedback(&self, feedback: UserFeedback) -> Result<()> {
        self.command(Command::Feedback(Box::new(feedback)), "post user feedback")
    }

    /// Route one recorded or live signal to the dispatcher or the coordinator.
    pub fn apply(&self, signal: NavigationSignal) -> Result<()> {
        match signal {
            NavigationSignal::RawLocation(location) => self.dispatcher.on_raw_location(location),
            NavigationSignal::Progress(progress) => self.dispatcher.on_progress(progress),
            NavigationSignal::RoutesChanged(routes) => self.dispatcher.on_routes_changed(&routes),
            NavigationSignal::OffRoute(off_route) => self.dispatcher.on_off_route(off_route),
            NavigationSignal::RouteRequestFailed(reason) => {
                self.dispatcher.on_route_request_failed(&reason)
            }
            NavigationSignal::SessionState(state) => return self.on_session_state_changed(state),
            NavigationSignal::Feedback(feedback) => return self.post_user_feedback(feedback),
        }
        Ok(())
    }

    /// Whether the coordinator is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    fn command(&self, command: Command, operation: &str) -> Result<()> {
        self.commands.send(command).map_err(|_| TelemetryError::not_running(operation))
    }
}

impl SessionStateObserver for TelemetryHandle {
    fn on_session_state_changed(&self, state: NavigationSessionState) {
        if let Err(e) = TelemetryHandle::on_session_state_changed(self, state) {
            warn!("Session state {} dropped: {}", state, e);
        }
    }
}

/// Observer handles registered with the host, kept for unregistration.
struct Observers {
    progress: Arc<dyn RouteProgressObserver>,
    location: Arc<dyn LocationObserver>,
    routes: Arc<dyn RoutesObserver>,
    off_route: Arc<dyn OffRouteObserver>,
    session_state: Arc<dyn SessionStateObserver>,
}

impl Observers {
    fn new(handle: &TelemetryHandle) -> Self {
        let dispatcher = &handle.dispatcher;
        Self {
            progress: Arc::clone(dispatcher) as Arc<dyn RouteProgressObserver>,
            location: Arc::clone(dispatcher) as Arc<dyn LocationObserver>,
            routes: Arc::clone(dispatcher) as Arc<dyn RoutesObserver>,
            off_route: Arc::clone(dispatcher) as Arc<dyn OffRouteObserver>,
            session_state: Arc::new(handle.clone()),
        }
    }
}

/// Navigation telemetry service.
pub struct NavigationTelemetry {
    handle: TelemetryHandle,
    values: Arc<SessionValues>,
    observers: Observers,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    delivery: Option<JoinHandle<()>>,
}

impl NavigationTelemetry {
    pub fn builder() -> TelemetryBuilder {
        TelemetryBuilder::new()
    }

    pub fn handle(&self) -> TelemetryHandle {
        self.handle.clone()
    }

    pub fn dispatcher(&self) -> &Arc<TelemetryDispatcher> {
        self.handle.dispatcher()
    }

    pub fn on_session_state_changed(&self, state: NavigationSessionState) -> Result<()> {
        self.handle.on_session_state_changed(state)
    }

    pub fn post_user_feedback(&self, feedback: UserFeedback) -> Result<()> {
        self.handle.post_user_feedback(feedback)
    }

    /// Copy of the current session values.
    pub fn session(&self) -> SessionSnapshot {
        self.values.snapshot()
    }

    /// Register every telemetry observer with the host.
    pub fn register(&self, navigation: &dyn NavigationObservable) {
        let observers = &self.observers;
        navigation.register_route_progress_observer(Arc::clone(&observers.progress));
        navigation.register_location_observer(Arc::clone(&observers.location));
        navigation.register_routes_observer(Arc::clone(&observers.routes));
        navigation.register_off_route_observer(Arc::clone(&observers.off_route));
        navigation.register_session_state_observer(Arc::clone(&observers.session_state));
        debug!("Telemetry observers registered");
    }

    /// Unregister the observers previously passed to [`register`](Self::register).
    pub fn unregister(&self, navigation: &dyn NavigationObservable) {
        let observers = &self.observers;
        navigation.unregister_route_progress_observer(&observers.progress);
        navigation.unregister_location_observer(&observers.location);
        navigation.unregister_routes_observer(&observers.routes);
        navigation.unregister_off_route_observer(&observers.off_route);
        navigation.unregister_session_state_observer(&observers.session_state);
        debug!("Telemetry observers unregistered");
    }

    /// Stop the session, then wait until every queued event is delivered and the
    /// reporter is disabled.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Telemetry coordinator ended abnormally: {}", e);
            }
        }
        if let Some(delivery) = self.delivery.take() {
            if let Err(e) = delivery.await {
                warn!("Event delivery ended abnormally: {}", e);
            }
        }
        info!("Navigation telemetry shut down");
    }
}

impl Drop for NavigationTelemetry {
    fn drop(&mut self) {
        debug!("Dropping navigation telemetry");
        self.cancel.cancel();
    }
}
