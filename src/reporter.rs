//! Metrics sinks
//!
//! The session coordinator only populates events and queues them. The telemetry
//! service calls the reporter from the blocking pool, one event at a time in queue
//! order; batching and retry belong to the sink.

use std::io::Write;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use crate::events::MetricEvent;
use crate::{Result, TelemetryError};

/// Destination for telemetry events.
pub trait MetricsReporter: Send + Sync {
    /// Accept one event. May block; calls never run on the thread delivering locations.
    fn add_event(&self, event: MetricEvent);

    /// Called once when the owning telemetry service shuts down.
    fn disable(&self) {}
}

/// Reporter that forwards events into an in-process stream.
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<MetricEvent>,
}

impl ChannelReporter {
    /// Create the reporter and the stream its events arrive on.
    ///
    /// The stream ends once the reporter and every clone of its sender are dropped.
    pub fn new() -> (Self, impl Stream<Item = MetricEvent> + Unpin + 'static) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, UnboundedReceiverStream::new(rx))
    }
}

impl MetricsReporter for ChannelReporter {
    fn add_event(&self, event: MetricEvent) {
        if self.tx.send(event).is_err() {
            debug!("Event stream receiver dropped, event discarded");
        }
    }
}

/// Reporter writing each event as one line of JSON.
///
/// Every write is flushed. Used directly, `add_event` blocks on the writer.
pub struct JsonLinesReporter<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesReporter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }

    /// Serialize and write a single event.
    pub fn write_event(&self, event: &MetricEvent) -> Result<()> {
        let line = serde_json::to_string(event)
            .map_err(|e| TelemetryError::sink_error("serialize event", Box::new(e)))?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{line}")
            .and_then(|_| writer.flush())
            .map_err(|e| TelemetryError::sink_error("write event", Box::new(e)))
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> MetricsReporter for JsonLinesReporter<W> {
    fn add_event(&self, event: MetricEvent) {
        if let Err(e) = self.write_event(&event) {
            warn!("Failed to record {}: {}", event.metric_name(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NavigationEventData;
    use futures::StreamExt;

    #[tokio::test]
    async fn channel_reporter_streams_events() {
        let (reporter, events) = ChannelReporter::new();
        reporter.add_event(MetricEvent::Depart(NavigationEventData::default()));
        reporter.add_event(MetricEvent::Arrive(NavigationEventData::default()));
        drop(reporter);

        let names: Vec<_> = events.map(|e| e.metric_name()).collect().await;
        assert_eq!(names, vec!["navigation.depart", "navigation.arrive"]);
    }

    #[test]
    fn channel_reporter_tolerates_dropped_stream() {
        let (reporter, events) = ChannelReporter::new();
        drop(events);
        reporter.add_event(MetricEvent::Depart(NavigationEventData::default()));
    }

    #[test]
    fn json_lines_one_event_per_line() {
        let reporter = JsonLinesReporter::new(Vec::new());
        reporter.add_event(MetricEvent::Depart(NavigationEventData::default()));
        reporter.add_event(MetricEvent::Arrive(NavigationEventData::default()));

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "navigation.depart");
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn json_lines_write_failure_is_sink_error() {
        let reporter = JsonLinesReporter::new(FailingWriter);
        let err = reporter.write_event(&MetricEvent::Depart(NavigationEventData::default()));
        assert!(matches!(err, Err(TelemetryError::Sink { .. })));
    }
}
