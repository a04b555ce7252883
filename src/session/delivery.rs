//! Event delivery task
//!
//! Events are queued by whichever thread produced them and handed to the reporter
//! by a single task, in queue order. Each reporter call runs on the blocking pool,
//! so a slow sink stalls neither location delivery nor the coordinator.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::events::MetricEvent;
use crate::reporter::MetricsReporter;

#[derive(Debug)]
pub(crate) enum Delivery {
    Event(MetricEvent),
    /// Disable the reporter and end the task. Later events are discarded.
    Disable,
}

pub(crate) type DeliveryQueue = mpsc::UnboundedSender<Delivery>;

pub(crate) async fn deliver_events(
    reporter: Arc<dyn MetricsReporter>,
    mut queue: mpsc::UnboundedReceiver<Delivery>,
) {
    while let Some(delivery) = queue.recv().await {
        let disable = matches!(delivery, Delivery::Disable);
        let reporter = Arc::clone(&reporter);
        let call = tokio::task::spawn_blocking(move || match delivery {
            Delivery::Event(event) => reporter.add_event(event),
            Delivery::Disable => reporter.disable(),
        });
        if let Err(e) = call.await {
            warn!("Metrics reporter call failed: {}", e);
        }
        if disable {
            debug!("Metrics reporter disabled");
            return;
        }
    }
    debug!("Event queue closed");
}
