//! Navigation telemetry: location buffering and session lifecycle events.
//!
//! The crate sits between a navigation SDK and a metrics sink. It records raw
//! locations, route progress and route changes, decides when a guidance session
//! starts and ends, and hands well-formed events to a [`MetricsReporter`]:
//!
//! - **Depart / Arrive / Cancel** mark the session lifecycle
//! - **Reroute** and **Feedback** carry the locations recorded before and after them
//! - **Turnstile** is sent once when the service starts
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use navigation_telemetry::{ChannelReporter, NavigationSessionState, NavigationTelemetry};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (reporter, mut events) = ChannelReporter::new();
//!     let telemetry = NavigationTelemetry::builder().reporter(Arc::new(reporter)).start()?;
//!
//!     // Feed signals from the host SDK
//!     let dispatcher = telemetry.dispatcher();
//!     # let route = Arc::new(navigation_telemetry::Route::default());
//!     dispatcher.on_routes_changed(&[route]);
//!     telemetry.on_session_state_changed(NavigationSessionState::ActiveGuidance)?;
//!
//!     while let Some(event) = events.next().await {
//!         println!("{}", event.metric_name());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Replaying a recorded trip
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use navigation_telemetry::{Driver, JsonLinesReporter, NavigationTelemetry, ReplayProvider};
//!
//! # async fn replay() -> navigation_telemetry::Result<()> {
//! let reporter = JsonLinesReporter::new(std::io::stdout());
//! let telemetry = NavigationTelemetry::builder().reporter(Arc::new(reporter)).start()?;
//!
//! let provider = ReplayProvider::open("trip.yaml")?.with_speed(4.0);
//! Driver::spawn(provider, telemetry.handle()).finished().await;
//! telemetry.shutdown().await;
//! # Ok(())
//! # }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Buffering and signal aggregation
pub mod buffer;
pub mod dispatcher;
pub mod observer;

// Events and the session lifecycle
pub mod events;
pub mod reporter;
pub mod session;

// Signal sources
pub mod driver;
pub mod provider;
pub mod providers;

// Core exports
pub use config::TelemetryConfig;
pub use error::*;
pub use types::*;

// Main API exports
pub use dispatcher::{NewRoute, TelemetryDispatcher};
pub use driver::{Driver, DriverTask};
pub use events::{FeedbackSource, FeedbackType, MetricEvent, UserFeedback};
pub use provider::{NavigationSignal, SignalProvider};
pub use providers::{ReplayProvider, TripRecording};
pub use reporter::{ChannelReporter, JsonLinesReporter, MetricsReporter};
pub use session::{NavigationTelemetry, SessionSnapshot, TelemetryBuilder, TelemetryHandle};
