//! Session lifecycle actor
//!
//! One task owns the session lifecycle. Session-state changes and feedback arrive
//! over a command channel; new routes and route progress arrive on the dispatcher's
//! conflating channels. Handling them all in a single `select!` loop serializes
//! every transition, so start, stop and route handling never interleave.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::context::EventContext;
use crate::dispatcher::NewRoute;
use crate::events::UserFeedback;
use crate::types::{NavigationSessionState, Route, RouteProgress};

type ProgressReceiver = watch::Receiver<Option<Arc<RouteProgress>>>;

#[derive(Debug)]
pub(crate) enum Command {
    SessionState(NavigationSessionState),
    Feedback(Box<UserFeedback>),
}

pub(crate) struct Coordinator {
    ctx: Arc<EventContext>,
    commands: mpsc::UnboundedReceiver<Command>,
    new_routes: watch::Receiver<Option<NewRoute>>,
    progress: Option<ProgressReceiver>,
    cancel: CancellationToken,
}

impl Coordinator {
    pub(crate) fn new(
        ctx: Arc<EventContext>,
        commands: mpsc::UnboundedReceiver<Command>,
        cancel: CancellationToken,
    ) -> Self {
        let new_routes = ctx.dispatcher.subscribe_new_routes();
        Self { ctx, commands, new_routes, progress: None, cancel }
    }

    pub(crate) async fn run(mut self) {
        info!("Telemetry session coordinator started");

        loop {
            let deferred = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("Telemetry cancelled");
                    break;
                }

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("All telemetry handles dropped");
                        break;
                    }
                },

                Ok(()) = self.new_routes.changed() => {
                    let new_route = self.new_routes.borrow_and_update().clone();
                    match new_route {
                        Some(new_route) => self.handle_new_route(new_route).await,
                        None => None,
                    }
                }

                progress = next_progress(&mut self.progress) => {
                    self.handle_progress(&progress);
                    None
                }
            };

            // a command that interrupted a pending start is handled next
            let mut next = deferred;
            while let Some(command) = next.take() {
                next = self.handle_command(command).await;
            }
        }

        if self.ctx.values.is_started() {
            self.stop_session();
        }
        self.ctx.disable_reporter();
        info!("Telemetry session coordinator stopped");
    }

    async fn handle_command(&mut self, command: Command) -> Option<Command> {
        match command {
            Command::SessionState(NavigationSessionState::ActiveGuidance) => {
                if self.ctx.values.is_started() {
                    debug!("Session already started");
                    return None;
                }
                self.start_session().await
            }
            Command::SessionState(state) => {
                debug!(%state, "navigation session inactive");
                if self.ctx.values.is_started() {
                    self.stop_session();
                }
                self.stop_progress_monitoring();
                None
            }
            Command::Feedback(feedback) => {
                self.handle_feedback(*feedback);
                None
            }
        }
    }

    /// Wait for the original route, then begin a session and send depart.
    ///
    /// Returns a session-state command that arrived while waiting; the start is
    /// abandoned in that case.
    async fn start_session(&mut self) -> Option<Command> {
        debug!("Starting telemetry session");
        self.ctx.dispatcher.reset_route_progress();

        let resolved = self.ctx.dispatcher.original_route().wait().resolved();
        tokio::pin!(resolved);

        let route = loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return None,

                command = self.commands.recv() => match command {
                    Some(Command::Feedback(_)) => {
                        debug!("Feedback ignored, session not started");
                    }
                    Some(command) => {
                        info!("Session start abandoned");
                        return Some(command);
                    }
                    None => return None,
                },

                route = &mut resolved => break route,
            }
        };

        let Some(route) = route else {
            warn!("Original route discarded before the session started");
            return None;
        };

        self.ctx.values.start(Arc::clone(&route));
        info!(session_id = %self.ctx.values.session_id(), "Telemetry session started");
        self.ctx.send(self.ctx.depart(&route));
        self.start_progress_monitoring();
        None
    }

    fn stop_session(&mut self) {
        debug!("Stopping telemetry session");
        self.ctx.dispatcher.flush_event_windows();
        self.ctx.send(self.ctx.cancel());
        self.ctx.values.reset();
        self.ctx.dispatcher.reset_original_route(None);
        self.stop_progress_monitoring();
        info!("Telemetry session stopped");
    }

    async fn handle_new_route(&mut self, new_route: NewRoute) -> Option<Command> {
        match new_route {
            NewRoute::Reroute(route) => {
                self.handle_reroute(route);
                None
            }
            NewRoute::External(route) if self.ctx.values.is_started() => {
                info!("External route set, restarting session");
                self.stop_session();
                self.ctx.dispatcher.reset_original_route(Some(route));
                self.start_session().await
            }
            NewRoute::External(route) => {
                // no session to restart; the route only becomes the baseline for the next start
                debug!("External route set without a session");
                self.ctx.dispatcher.reset_original_route(Some(route));
                None
            }
        }
    }

    fn handle_reroute(&self, route: Arc<Route>) {
        let since_last_reroute = self.ctx.values.record_reroute();
        debug!(
            reroute_count = self.ctx.values.reroute_count(),
            seconds = since_last_reroute.as_secs(),
            "Reroute"
        );

        let ctx = Arc::clone(&self.ctx);
        self.ctx.dispatcher.open_event_window(Box::new(move |before, after| {
            let event = ctx.reroute(&route, since_last_reroute, &before, &after);
            ctx.send(event);
        }));
    }

    fn handle_feedback(&self, feedback: UserFeedback) {
        if !self.ctx.values.is_started() {
            debug!("Feedback ignored, session not started");
            return;
        }
        debug!(feedback_type = feedback.feedback_type.as_str(), "Feedback posted");

        let ctx = Arc::clone(&self.ctx);
        self.ctx.dispatcher.open_event_window(Box::new(move |before, after| {
            let event = ctx.feedback(feedback, &before, &after);
            ctx.send(event);
        }));
    }

    fn handle_progress(&mut self, progress: &RouteProgress) {
        if !progress.is_complete() {
            return;
        }

        if self.ctx.values.is_started() {
            info!("Route complete");
            self.ctx.dispatcher.flush_event_windows();
            self.ctx.values.record_arrival();
            self.ctx.send(self.ctx.arrive());
        } else {
            debug!("Route complete before the session started");
        }
        self.stop_progress_monitoring();
    }

    fn start_progress_monitoring(&mut self) {
        let mut rx = self.ctx.dispatcher.subscribe_progress();
        // the slot was cleared when the start began, so anything in it now is unconsumed
        if rx.borrow().is_some() {
            rx.mark_changed();
        }
        self.progress = Some(rx);
    }

    fn stop_progress_monitoring(&mut self) {
        self.progress = None;
    }
}

/// Next progress update, or never if progress is not being monitored.
async fn next_progress(progress: &mut Option<ProgressReceiver>) -> Arc<RouteProgress> {
    let Some(rx) = progress else {
        return std::future::pending().await;
    };
    loop {
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
        if let Some(progress) = rx.borrow_and_update().clone() {
            return progress;
        }
    }
}
